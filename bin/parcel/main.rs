use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod opts;

use opts::{Build, Download, Info, Keygen, Lint, Opts, SubCommand, Upload};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        for (i, cause) in err.chain().skip(1).enumerate() {
            if i == 0 {
                eprintln!("\ncaused by:");
            }
            eprintln!("  {}: {}", i + 1, cause);
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let parcel_home = resolve_parcel_home(opts.parcel_home)?;

    match opts.subcmd {
        SubCommand::Keygen(cmd) => keygen(&parcel_home, cmd),
        SubCommand::Build(cmd) => build(&parcel_home, cmd),
        SubCommand::Info(cmd) => info(cmd),
        SubCommand::Lint(cmd) => lint(cmd),
        SubCommand::Download(cmd) => download(cmd),
        SubCommand::Upload(cmd) => upload(cmd),
    }
}

fn resolve_parcel_home(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine home directory; set PARCEL_HOME"))?;
    Ok(home.join(".parcel"))
}

fn keygen(parcel_home: &Path, cmd: Keygen) -> anyhow::Result<()> {
    std::fs::create_dir_all(parcel_home)?;
    let path = parcel_home.join(&cmd.name);
    let key = parcel::signature::keygen(&path, cmd.force)?;
    println!("wrote signing key to {}", path.display());
    println!("pubkey: {}", STANDARD.encode(key.verifying_key().to_bytes()));
    Ok(())
}

fn build(parcel_home: &Path, cmd: Build) -> anyhow::Result<()> {
    let manifest = parcel::Manifest::load(&cmd.manifest)?;

    let output = cmd.output.unwrap_or_else(|| {
        PathBuf::from(format!("{}-{}.pcl", manifest.name(), manifest.version()))
    });

    let key_path = cmd.key.unwrap_or_else(|| parcel_home.join("key"));
    let existing_key = key_path
        .is_file()
        .then(|| parcel::signature::load_key(&key_path))
        .transpose()?;
    let generated_fresh_key = existing_key.is_none();

    let (built, signing_key) =
        parcel::save_parcel(&manifest, &output, existing_key, cmd.force)?;

    if generated_fresh_key {
        std::fs::create_dir_all(parcel_home)?;
        parcel::signature::save_key(&signing_key, &key_path, false)?;
        println!("generated and saved a new signing key at {}", key_path.display());
    }

    println!("wrote {}", output.display());
    if let Some(pubkey) = built.pubkey() {
        println!("pubkey: {}", STANDARD.encode(pubkey));
    }
    Ok(())
}

fn info(cmd: Info) -> anyhow::Result<()> {
    let parcel = parcel::load_parcel(&cmd.parcel, !cmd.no_verify)?;
    print_manifest(parcel.manifest());

    if let Some(signature) = parcel.signature() {
        println!("signature: {}", STANDARD.encode(signature));
    }
    if let Some(pubkey) = parcel.pubkey() {
        println!("pubkey: {}", STANDARD.encode(pubkey));
    }
    Ok(())
}

fn print_manifest(manifest: &parcel::Manifest) {
    println!("name: {}", manifest.name());
    println!("version: {}", manifest.version());
    println!("uuid: {}", manifest.uuid());
    if let Some(description) = manifest.description() {
        println!("description: {}", description);
    }
    if let Some(service_definition) = manifest.service_definition() {
        println!("service definition: {}", service_definition);
    }

    println!("options:");
    for option in manifest.options() {
        println!("  {} ({}): {}", option.name, option.type_label, option.description);
    }
    println!("settings:");
    for setting in manifest.settings() {
        println!("  {}", setting.name);
    }
    println!("requires:");
    for spec in manifest.requires() {
        println!("  {}", spec);
    }
    println!("conflicts:");
    for spec in manifest.conflicts() {
        println!("  {}", spec);
    }
    println!("files:");
    for file in manifest.files() {
        println!("  {} ({} bytes)", file.name(), file.bytes().len());
    }
}

fn lint(cmd: Lint) -> anyhow::Result<()> {
    let parcel = parcel::load_parcel(&cmd.parcel, !cmd.no_verify)?;
    parcel::lint(parcel.manifest())?;
    println!("{}: ok", cmd.parcel.display());
    Ok(())
}

fn download(cmd: Download) -> anyhow::Result<()> {
    anyhow::bail!(
        "download is reserved for future catalog distribution support; cannot fetch `{}`",
        cmd.name
    )
}

fn upload(cmd: Upload) -> anyhow::Result<()> {
    anyhow::bail!(
        "upload is reserved for future catalog distribution support; cannot publish `{}`",
        cmd.parcel.display()
    )
}
