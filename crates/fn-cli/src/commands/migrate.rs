use std::path::PathBuf;

use clap::Args;
use fn_core::migrate::migrate_dir;

use crate::session::working_dir;

#[derive(Args)]
pub struct MigrateArgs {
    #[arg(long, short = 'w')]
    pub working_dir: Option<PathBuf>,
}

pub fn migrate(args: MigrateArgs) -> anyhow::Result<()> {
    let dir = working_dir(args.working_dir.as_ref())?;
    match migrate_dir(&dir) {
        Ok(done) => {
            println!(
                "Successfully migrated {}, the original was saved to {}",
                done.path.display(),
                done.backup.display()
            );
            Ok(())
        }
        Err(e @ fn_core::Error::AlreadyMigrated { .. }) => {
            println!("{e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
