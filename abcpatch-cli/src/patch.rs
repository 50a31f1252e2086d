use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use abcpatch::{
    config::{PatchConfig, RsaKeys},
    patches::{PatchOutcome, PatchReport},
    Game,
};
use anyhow::{bail, Context};

use crate::app::Cli;

const CLIENT_FILE: &str = "Habbo.swf";
const KEYS_FILE: &str = "RSAKeys.txt";
const HEADERS_FILE: &str = "Headers.txt";

/// Translate the command line into a patch selection.
pub fn config(cli: &Cli) -> anyhow::Result<PatchConfig> {
    let mut config = PatchConfig::new()
        .with_domain_bypass(!cli.keep_domain_checks)
        .with_dump_headers(cli.dump_headers)
        .with_disable_handshake(cli.disable_handshake)
        .with_fix_identifiers(cli.fix_identifiers)
        .with_rename_registers(cli.rename_registers)
        .with_host_patterns(cli.patterns.iter().cloned());

    match (cli.genrsa, cli.rsa.as_deref()) {
        (Some(bits), _) => {
            log::info!("Generating a {bits}-bit RSA key pair");
            config = config.with_rsa_keys(RsaKeys::generate(bits)?);
        }
        (None, Some([exponent, modulus])) => {
            config = config.with_rsa_keys(RsaKeys::new(exponent, modulus)?);
        }
        (None, Some(other)) => bail!("--rsa takes an exponent and a modulus, got {} values", other.len()),
        (None, None) if cli.keep_rsa => config.rsa_keys = None,
        (None, None) => {}
    }
    if let Some(compression) = cli.compression {
        config = config.with_compression(compression);
    }
    if let Some(revision) = &cli.revision {
        config = config.with_revision(revision.clone());
    }
    if let Some(output) = &cli.output {
        config = config.with_output(output.clone());
    }
    Ok(config)
}

pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = config(cli)?;
    let started = Instant::now();

    let mut game = Game::from_file(&cli.game)
        .with_context(|| format!("failed to load {}", cli.game.display()))?;
    println!("Revision: {}", game.revision().unwrap_or("unknown"));
    let missing = game.targets().missing();
    if !missing.is_empty() {
        log::warn!("Targets not located: {}", missing.join(", "));
    }

    let reports = game.run(&config);
    for report in &reports {
        println!("{}", status_line(report));
    }
    let headers = config.dump_headers.then(|| game.dump_headers()).flatten();

    let output = output_path(&cli.game, config.output.as_deref(), game.revision());
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    game.save(&output, config.compression)
        .with_context(|| format!("failed to write {}", output.display()))?;
    log::info!("Finished in {:.2}s: {}", started.elapsed().as_secs_f64(), game.summary());
    println!("Client: {}", output.display());

    let directory = output.parent().unwrap_or_else(|| Path::new("."));
    if let Some(keys) = &config.rsa_keys {
        let path = directory.join(KEYS_FILE);
        fs::write(&path, keys_text(keys)).with_context(|| format!("failed to write {}", path.display()))?;
        println!("RSA Keys: {}", path.display());
    }
    if config.dump_headers {
        match headers {
            Some(headers) => {
                let path = directory.join(HEADERS_FILE);
                fs::write(&path, headers).with_context(|| format!("failed to write {}", path.display()))?;
                println!("Headers: {}", path.display());
            }
            None => log::warn!("No message registry; headers not written"),
        }
    }
    Ok(())
}

fn status_line(report: &PatchReport) -> String {
    let mark = match report.outcome {
        PatchOutcome::Applied => "ok",
        PatchOutcome::NotFound(_) => "skip",
        PatchOutcome::Rejected(_) => "FAIL",
    };
    format!("[{mark:>4}] {report}")
}

/// `-o` when given, else `<input dir>/<revision>/Habbo.swf`.
fn output_path(input: &Path, output: Option<&Path>, revision: Option<&str>) -> PathBuf {
    if let Some(output) = output {
        return output.to_path_buf();
    }
    let directory = input.parent().unwrap_or_else(|| Path::new("."));
    match revision {
        Some(revision) if !directory.ends_with(revision) => directory.join(revision).join(CLIENT_FILE),
        _ => directory.join(CLIENT_FILE),
    }
}

fn keys_text(keys: &RsaKeys) -> String {
    let mut text = format!("Exponent(e): {}\nModulus(n): {}\n", keys.exponent, keys.modulus);
    if let Some(private) = keys.private_exponent() {
        text.push_str(&format!("Private Exponent(d): {private}\n"));
    }
    text
}
