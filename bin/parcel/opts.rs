use std::path::PathBuf;

use clap::Parser;

const DESCRIPTION: &str = r#"
The Parcel Package Manager

Parcel builds, signs, inspects and lints service parcels: signed archives
bundling a service definition, its configuration files, and a dependency
specification. This binary does not talk to a catalog -- `download` and
`upload` are reserved for that and are not yet implemented.
"#;

#[derive(Parser)]
#[clap(name = "parcel", version = clap::crate_version!(), author = "Parcel maintainers", about = DESCRIPTION)]
pub struct Opts {
    #[clap(
        long = "parcel-home",
        env = "PARCEL_HOME",
        help = "Directory holding this system's signing keys. Defaults to ~/.parcel/"
    )]
    pub parcel_home: Option<PathBuf>,

    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Parser)]
pub enum SubCommand {
    #[clap(
        name = "keygen",
        about = "Generate a new Ed25519 signing key and store it under PARCEL_HOME"
    )]
    Keygen(Keygen),
    #[clap(name = "build", about = "Build and sign a parcel from a manifest document")]
    Build(Build),
    #[clap(name = "info", about = "Print a parcel's manifest, signature, and file listing")]
    Info(Info),
    #[clap(name = "lint", about = "Lint a parcel's manifest against its service definition")]
    Lint(Lint),
    #[clap(
        name = "download",
        about = "Fetch a parcel from a catalog (reserved, not implemented)"
    )]
    Download(Download),
    #[clap(
        name = "upload",
        about = "Publish a parcel to a catalog (reserved, not implemented)"
    )]
    Upload(Upload),
}

#[derive(Parser)]
pub struct Keygen {
    #[clap(
        long,
        short,
        help = "key filename under PARCEL_HOME",
        default_value = "key"
    )]
    pub name: String,
    #[clap(long, short, help = "overwrite an existing key file")]
    pub force: bool,
}

#[derive(Parser)]
pub struct Build {
    #[clap(help = "path to the manifest JSON document")]
    pub manifest: PathBuf,
    #[clap(
        long,
        short,
        help = "output path; defaults to <name>-<version>.pcl in the current directory"
    )]
    pub output: Option<PathBuf>,
    #[clap(
        long,
        short,
        help = "signing key to use; defaults to PARCEL_HOME/key, generating and persisting one if absent"
    )]
    pub key: Option<PathBuf>,
    #[clap(long, short, help = "overwrite an existing parcel at the output path")]
    pub force: bool,
}

#[derive(Parser)]
pub struct Info {
    #[clap(help = "path to the .pcl parcel")]
    pub parcel: PathBuf,
    #[clap(long, help = "skip signature verification")]
    pub no_verify: bool,
}

#[derive(Parser)]
pub struct Lint {
    #[clap(help = "path to the .pcl parcel")]
    pub parcel: PathBuf,
    #[clap(long, help = "skip signature verification")]
    pub no_verify: bool,
}

#[derive(Parser)]
pub struct Download {
    #[clap(help = "name of the parcel to fetch")]
    pub name: String,
}

#[derive(Parser)]
pub struct Upload {
    #[clap(help = "path to the .pcl parcel to publish")]
    pub parcel: PathBuf,
}
