use crate::cli::{GlobalOpts, OwnerArgs, OwnerCommand};
use crate::config;
use crate::error::CliError;

pub fn handle(args: OwnerArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;

    match args.command {
        OwnerCommand::Show => {
            let path = config::config_path(global);
            match cfg
                .preferred_owner()
                .map_err(|e| CliError::from_config(e, &path))?
            {
                Some(owner) => println!("{owner}"),
                None => println!("(none)"),
            }
        }
        OwnerCommand::Set { owner } => {
            cfg.set_preferred_owner(Some(owner));
            config::save(global, &cfg)?;
            eprintln!("Owner set to {owner}");
        }
        OwnerCommand::Clear => {
            cfg.set_preferred_owner(None);
            config::save(global, &cfg)?;
            eprintln!("Owner preference cleared");
        }
    }
    Ok(())
}
