use std::path::Path;

use anyhow::{Context, Result};
use apkforge_protocol::Session;
use colored::*;

use crate::config::Config;

pub fn login(config_path: &Path, user_id: String, token: String) -> Result<()> {
    let mut config = Config::load(config_path)?;
    config.session = Some(Session::new(user_id, token));
    config
        .save(config_path)
        .context("failed to store the session")?;
    println!("{}", "Logged in.".green());
    Ok(())
}

pub fn logout(config_path: &Path) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if config.session.take().is_none() {
        println!("{}", "Not logged in.".yellow());
        return Ok(());
    }
    config.save(config_path)?;
    println!("{}", "Logged out.".green());
    Ok(())
}
