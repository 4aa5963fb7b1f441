use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use casefile_types::EntityType;

#[derive(Parser)]
#[command(
    name = "casefile",
    about = "Casefile: case and suspect records with linked audit trail",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (TOML). Defaults to ./casefile.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory, overriding the config file.
    #[arg(long, global = true, env = "CASEFILE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "CASEFILE_ACTOR_ID", default_value = "cli")]
    pub actor_id: String,

    #[arg(long, global = true, env = "CASEFILE_ACTOR_NAME", default_value = "Casefile CLI")]
    pub actor_name: String,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create, inspect and delete cases
    Case(CaseArgs),
    /// Create, inspect and delete suspects
    Suspect(SuspectArgs),
    /// Link a suspect to the case with a reference number
    Link(LinkArgs),
    /// Suggest suspects to link for a reference number
    Suggest(SuggestArgs),
    /// Search and verify the audit trail
    Audit(AuditArgs),
}

#[derive(Args)]
pub struct CaseArgs {
    #[command(subcommand)]
    pub action: CaseAction,
}

#[derive(Subcommand)]
pub enum CaseAction {
    /// Create a case
    Create(CaseCreateArgs),
    /// Add or remove suspect links and exhibits on a case
    UpdateLinks(CaseUpdateLinksArgs),
    Show { id: String },
    List,
    Delete { id: String },
}

#[derive(Args)]
pub struct CaseCreateArgs {
    /// Start from a JSON case draft; flags below override its fields
    #[arg(long)]
    pub draft: Option<PathBuf>,
    #[arg(long)]
    pub sequence: Option<i64>,
    #[arg(long)]
    pub year: Option<i64>,
    #[arg(long)]
    pub offence: Option<String>,
    #[arg(long)]
    pub investigator: Option<String>,
    #[arg(long)]
    pub brief_facts: Option<String>,
    /// Suspect id to link (repeatable)
    #[arg(long = "suspect")]
    pub suspects: Vec<String>,
    /// File to upload as an exhibit (repeatable)
    #[arg(long = "exhibit")]
    pub exhibits: Vec<PathBuf>,
    /// Image to attach as a camera capture (repeatable)
    #[arg(long = "capture")]
    pub captures: Vec<PathBuf>,
}

#[derive(Args)]
pub struct CaseUpdateLinksArgs {
    pub id: String,
    /// Suspect id to link (repeatable)
    #[arg(long = "add")]
    pub add: Vec<String>,
    /// Suspect id to unlink (repeatable)
    #[arg(long = "remove")]
    pub remove: Vec<String>,
    /// File to upload as an additional exhibit (repeatable)
    #[arg(long = "exhibit")]
    pub exhibits: Vec<PathBuf>,
    /// Exhibit id to drop; its file is deleted (repeatable)
    #[arg(long = "drop-exhibit")]
    pub drop_exhibits: Vec<String>,
}

#[derive(Args)]
pub struct SuspectArgs {
    #[command(subcommand)]
    pub action: SuspectAction,
}

#[derive(Subcommand)]
pub enum SuspectAction {
    /// Create a suspect
    Create(SuspectCreateArgs),
    Show { id: String },
    List,
    Delete { id: String },
}

#[derive(Args)]
pub struct SuspectCreateArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub nickname: Option<String>,
    /// Case reference number (NNN/YYYY) the suspect is involved in
    #[arg(long)]
    pub reference: Option<String>,
    /// Profile image file
    #[arg(long)]
    pub image: Option<PathBuf>,
}

#[derive(Args)]
pub struct LinkArgs {
    pub reference: String,
    pub suspect: String,
}

#[derive(Args)]
pub struct SuggestArgs {
    /// Reference number to look up; omit with --watch
    pub reference: Option<String>,
    /// Case whose current links are left out of the suggestion
    #[arg(long)]
    pub case: Option<String>,
    /// Read reference edits from stdin, one per line, and suggest as they settle
    #[arg(long)]
    pub watch: bool,
}

#[derive(Args)]
pub struct AuditArgs {
    /// Case-insensitive text to search for
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub entity_type: Option<EntityArg>,
    #[arg(long)]
    pub entity_id: Option<String>,
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
    /// Check sequence and hash-chain integrity instead of listing
    #[arg(long)]
    pub verify: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum EntityArg {
    Case,
    Suspect,
    User,
    System,
}

impl From<EntityArg> for EntityType {
    fn from(arg: EntityArg) -> Self {
        match arg {
            EntityArg::Case => EntityType::Case,
            EntityArg::Suspect => EntityType::Suspect,
            EntityArg::User => EntityType::User,
            EntityArg::System => EntityType::System,
        }
    }
}
