//! Generate a batch of vouchers into a ZIP archive

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use colored::Colorize;
use voucher::archive;
use voucher::{CodecMode, VoucherBatch, VoucherBuilder};

use super::AppContext;

/// Options for voucher generation
pub struct GenerateOptions {
    pub count: i64,
    /// Link base; config value when `None`
    pub base_url: Option<String>,
    pub out: PathBuf,
    /// Force the hardened codec regardless of config
    pub hardened: bool,
    pub force: bool,
}

pub fn run(ctx: &AppContext, options: GenerateOptions) -> Result<()> {
    if options.out.exists() && !options.force {
        bail!(
            "{} already exists. Use --force to overwrite.\n\
             Warning: the existing archive may hold the only copy of issued voucher keys!",
            options.out.display()
        );
    }

    let network = ctx.network(None);
    let base_url = options
        .base_url
        .clone()
        .unwrap_or_else(|| ctx.config.base_url.clone());
    let mode = if options.hardened {
        CodecMode::Hardened
    } else {
        ctx.config.codec
    };

    println!("{}", "=== Voucher Generation ===".cyan().bold());
    println!();
    println!("  Network:  {}", network);
    println!("  Base URL: {}", base_url);
    println!("  Codec:    {}", mode);
    println!();

    let batch = VoucherBuilder::new(network, base_url)
        .with_mode(mode)
        .generate_batch(options.count)?;

    write_archive(&batch, &options.out)?;

    println!("{}", format!("Generated {} voucher(s):", batch.len()).green());
    for voucher in &batch.vouchers {
        println!("  {}", voucher.address);
    }
    println!();
    println!("Archive: {}", options.out.display());
    println!();
    println!(
        "{}",
        "WARNING: manifest.csv holds plaintext private keys and secrets.".red().bold()
    );
    println!(
        "{}",
        "Fund each address, distribute links and QR codes separately, then store the archive offline."
            .yellow()
    );

    Ok(())
}

fn write_archive(batch: &VoucherBatch, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).context("Failed to create output directory")?;
    }

    write_private(path, |file| {
        archive::write_archive_to(&batch.vouchers, file).context("Failed to write voucher archive")?;
        Ok(())
    })?;
    tracing::info!(path = %path.display(), count = batch.len(), "archive written");
    Ok(())
}

/// Write an owner-only file, removing it again if `write` fails
///
/// A partial archive may still hold plaintext keys.
fn write_private<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    let file = create_private(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write(file).inspect_err(|_| {
        let _ = fs::remove_file(path);
    })
}

/// Open `path` for writing, readable by the owner only from the first byte
fn create_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let file = options.open(path)?;

    // mode() only applies to new files; an overwritten archive keeps its old bits
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    Ok(file)
}
