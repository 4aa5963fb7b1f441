use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use casefile_attachments::{FsAttachmentStore, InlinePayload};
use casefile_ledger::{AuditQuery, AuditReader, ChainValidator, FileAuditLedger};
use casefile_links::{
    spawn_suggestion_task, CoordinatorError, CrossLinkCoordinator, DeleteOutcome, LinkResult,
    LinkSuggestion, SuggestionSession,
};
use casefile_store::FsRecordStore;
use casefile_types::{
    Actor, AuditAction, AuditLogEntry, Case, CaseDraft, CaseId, ExhibitDraft, ExhibitState,
    ProfileImageChange, Suspect, SuspectDraft, SuspectId, SuspectLinks,
};
use colored::Colorize;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::cli::*;
use crate::config::CasefileConfig;

struct Context {
    coordinator: CrossLinkCoordinator,
    ledger: Arc<FileAuditLedger>,
    actor: Actor,
    format: OutputFormat,
    settle: Duration,
}

impl Context {
    async fn open(config: &CasefileConfig, actor: Actor, format: OutputFormat) -> anyhow::Result<Self> {
        let records = FsRecordStore::open(config.records_dir())
            .await
            .context("opening record store")?;
        let blobs = FsAttachmentStore::open(config.attachments_dir())
            .await
            .context("opening attachment store")?;
        let ledger = Arc::new(FileAuditLedger::open(config.audit_log()).context("opening audit log")?);
        let coordinator = CrossLinkCoordinator::new(
            Arc::new(records),
            Arc::new(blobs),
            ledger.clone(),
            config.links.clone(),
        );
        Ok(Self {
            coordinator,
            ledger,
            actor,
            format,
            settle: config.links.suggestion_settle(),
        })
    }

    /// Print `value` as JSON, or run `text` for the human format.
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = CasefileConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    let actor = Actor::new(cli.actor_id, cli.actor_name);
    let ctx = Context::open(&config, actor, cli.format).await?;

    match cli.command {
        Command::Case(args) => match args.action {
            CaseAction::Create(args) => cmd_case_create(&ctx, args).await,
            CaseAction::UpdateLinks(args) => cmd_case_update_links(&ctx, args).await,
            CaseAction::Show { id } => cmd_case_show(&ctx, &id).await,
            CaseAction::List => cmd_case_list(&ctx).await,
            CaseAction::Delete { id } => cmd_case_delete(&ctx, &id).await,
        },
        Command::Suspect(args) => match args.action {
            SuspectAction::Create(args) => cmd_suspect_create(&ctx, args).await,
            SuspectAction::Show { id } => cmd_suspect_show(&ctx, &id).await,
            SuspectAction::List => cmd_suspect_list(&ctx).await,
            SuspectAction::Delete { id } => cmd_suspect_delete(&ctx, &id).await,
        },
        Command::Link(args) => cmd_link(&ctx, args).await,
        Command::Suggest(args) => cmd_suggest(&ctx, args).await,
        Command::Audit(args) => cmd_audit(&ctx, args).await,
    }
}

/// Log the full error and hand the user the short message.
fn failure(e: CoordinatorError) -> anyhow::Error {
    tracing::error!(error = ?e, "operation failed");
    anyhow::anyhow!(e.user_message())
}

// ---------------------------------------------------------------------------
// Cases
// ---------------------------------------------------------------------------

async fn cmd_case_create(ctx: &Context, args: CaseCreateArgs) -> anyhow::Result<()> {
    let mut draft = match &args.draft {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<CaseDraft>(&text).context("invalid case draft")?
        }
        None => CaseDraft::default(),
    };
    if args.sequence.is_some() {
        draft.sequence = args.sequence;
    }
    if args.year.is_some() {
        draft.year = args.year;
    }
    if let Some(offence) = args.offence {
        draft.offence = offence;
    }
    if let Some(investigator) = args.investigator {
        draft.assigned_investigator = investigator;
    }
    if let Some(facts) = args.brief_facts {
        draft.brief_facts = facts;
    }
    for id in args.suspects {
        draft.suspect_links.insert(SuspectId::new(id)?);
    }

    let id = ctx.coordinator.reserve_case_id();
    for path in &args.exhibits {
        let (name, bytes, mime) = read_attachment(path).await?;
        let exhibit = ctx
            .coordinator
            .attachments()
            .upload_exhibit(&id, &name, &bytes, mime)
            .await?;
        draft.exhibits.push(exhibit.into());
    }
    for path in &args.captures {
        let (name, bytes, mime) = read_attachment(path).await?;
        let payload = InlinePayload {
            mime_type: mime.to_string(),
            bytes,
        };
        draft
            .exhibits
            .push(ExhibitDraft::pending_capture(name, payload.to_data_uri()));
    }

    let write = ctx
        .coordinator
        .create_case_with_id(id, draft, &ctx.actor)
        .await
        .map_err(failure)?;
    ctx.emit(&write.case, || {
        println!(
            "{} Case {} created ({})",
            "✓".green().bold(),
            write.case.reference_number.to_string().yellow().bold(),
            write.case.id.as_str().dimmed()
        );
        println!(
            "  Exhibits: {} ({} failed)",
            write.case.exhibits.len(),
            write.exhibits.failures().count()
        );
        println!("  Suspects linked: {}", write.case.suspect_links.len());
        for err in write.propagation.failed() {
            println!("  {} {}", "!".red().bold(), err);
        }
    })
}

async fn cmd_case_update_links(ctx: &Context, args: CaseUpdateLinksArgs) -> anyhow::Result<()> {
    let id = CaseId::new(args.id)?;
    let case = ctx.coordinator.get_case(&id).await.map_err(failure)?;
    let mut draft = CaseDraft::from_case(&case);

    for suspect in args.add {
        draft.suspect_links.insert(SuspectId::new(suspect)?);
    }
    for suspect in args.remove {
        draft.suspect_links.remove(&SuspectId::new(suspect)?);
    }
    for exhibit_id in &args.drop_exhibits {
        let before = draft.exhibits.len();
        draft
            .exhibits
            .retain(|e| e.id.as_ref().map(|i| i.as_str()) != Some(exhibit_id.as_str()));
        if draft.exhibits.len() == before {
            bail!("case {} has no exhibit {exhibit_id}", case.reference_number);
        }
    }
    for path in &args.exhibits {
        let (name, bytes, mime) = read_attachment(path).await?;
        let exhibit = ctx
            .coordinator
            .attachments()
            .upload_exhibit(&id, &name, &bytes, mime)
            .await?;
        draft.exhibits.push(exhibit.into());
    }

    let write = ctx
        .coordinator
        .update_case(&id, draft, &ctx.actor)
        .await
        .map_err(failure)?;
    ctx.emit(&write.case, || {
        println!(
            "{} Case {} updated",
            "✓".green().bold(),
            write.case.reference_number.to_string().yellow().bold()
        );
        for delta in write.propagation.applied() {
            println!("  linked suspect {}", delta.suspect_id.as_str().cyan());
        }
        for delta in write.propagation.skipped() {
            println!("  {} suspect {} not found", "!".yellow(), delta.suspect_id);
        }
        for err in write.propagation.failed() {
            println!("  {} {}", "!".red().bold(), err);
        }
    })
}

async fn cmd_case_show(ctx: &Context, id: &str) -> anyhow::Result<()> {
    let case = ctx
        .coordinator
        .get_case(&CaseId::new(id)?)
        .await
        .map_err(failure)?;
    let mut suspects = Vec::new();
    for suspect_id in case.suspect_links.ids() {
        let name = match ctx.coordinator.get_suspect(suspect_id).await {
            Ok(s) => s.display_name().to_string(),
            Err(_) => "(missing)".to_string(),
        };
        suspects.push((suspect_id.clone(), name));
    }

    ctx.emit(&case, || {
        print_case_header(&case);
        println!("  Investigator: {}", case.assigned_investigator);
        println!("  Reported: {}", case.date_reported.to_rfc3339());
        if !case.brief_facts.is_empty() {
            println!("  Facts: {}", case.brief_facts);
        }
        println!("  Suspects ({}):", suspects.len());
        for (id, name) in &suspects {
            println!("    {} {}", id.short_id().dimmed(), name);
        }
        println!("  Exhibits ({}):", case.exhibits.len());
        for exhibit in &case.exhibits {
            let state = match exhibit.state() {
                ExhibitState::Stored => "stored".green(),
                ExhibitState::Failed => "upload failed".red(),
                ExhibitState::PendingCapture | ExhibitState::Uploading => "pending".yellow(),
            };
            println!(
                "    {} {} [{}] {}",
                exhibit.id.short_id().dimmed(),
                exhibit.name,
                state,
                exhibit.mime_type.dimmed()
            );
        }
    })
}

async fn cmd_case_list(ctx: &Context) -> anyhow::Result<()> {
    let cases = ctx.coordinator.list_cases().await.map_err(failure)?;
    ctx.emit(&cases, || {
        if cases.is_empty() {
            println!("No cases.");
        }
        for case in &cases {
            print_case_header(case);
        }
    })
}

async fn cmd_case_delete(ctx: &Context, id: &str) -> anyhow::Result<()> {
    let outcome = ctx
        .coordinator
        .delete_case(&CaseId::new(id)?, &ctx.actor)
        .await
        .map_err(failure)?;
    print_delete_outcome(ctx, "Case", &outcome)
}

fn print_case_header(case: &Case) {
    println!(
        "{}  {}  {:?}/{:?}  {}  ({} suspects)",
        case.reference_number.to_string().yellow().bold(),
        case.id.short_id().dimmed(),
        case.status,
        case.priority,
        case.offence,
        case.suspect_links.len()
    );
}

// ---------------------------------------------------------------------------
// Suspects
// ---------------------------------------------------------------------------

async fn cmd_suspect_create(ctx: &Context, args: SuspectCreateArgs) -> anyhow::Result<()> {
    let mut draft = SuspectDraft::named(args.name);
    draft.nickname = args.nickname;
    draft.linked_reference_number = args.reference;
    if let Some(path) = &args.image {
        let (_, bytes, mime) = read_attachment(path).await?;
        let payload = InlinePayload {
            mime_type: mime.to_string(),
            bytes,
        };
        draft.profile_image = ProfileImageChange::Replace {
            data_uri: payload.to_data_uri(),
        };
    }

    let suspect = ctx
        .coordinator
        .create_suspect(draft, &ctx.actor)
        .await
        .map_err(failure)?;
    ctx.emit(&suspect, || {
        println!(
            "{} Suspect {} created ({})",
            "✓".green().bold(),
            suspect.display_name().bold(),
            suspect.id.as_str().dimmed()
        );
        if args.image.is_some() && suspect.profile_image.is_none() {
            println!("  {} profile image could not be stored", "!".yellow());
        }
    })
}

async fn cmd_suspect_show(ctx: &Context, id: &str) -> anyhow::Result<()> {
    let suspect = ctx
        .coordinator
        .get_suspect(&SuspectId::new(id)?)
        .await
        .map_err(failure)?;
    ctx.emit(&suspect, || {
        print_suspect_header(&suspect);
        if let Some(nickname) = &suspect.nickname {
            println!("  Alias: {nickname}");
        }
        if let Some(status) = &suspect.custody_status {
            println!("  Custody: {status:?}");
        }
        if let Some(image) = &suspect.profile_image {
            println!("  Image: {}", image.url.blue());
        }
    })
}

async fn cmd_suspect_list(ctx: &Context) -> anyhow::Result<()> {
    let suspects = ctx.coordinator.list_suspects().await.map_err(failure)?;
    ctx.emit(&suspects, || {
        if suspects.is_empty() {
            println!("No suspects.");
        }
        for suspect in &suspects {
            print_suspect_header(suspect);
        }
    })
}

async fn cmd_suspect_delete(ctx: &Context, id: &str) -> anyhow::Result<()> {
    let id = SuspectId::new(id)?;
    let suspect = ctx.coordinator.get_suspect(&id).await.map_err(failure)?;
    let outcome = ctx
        .coordinator
        .delete_suspect(&id, suspect.display_name(), &ctx.actor)
        .await
        .map_err(failure)?;
    print_delete_outcome(ctx, "Suspect", &outcome)
}

fn print_suspect_header(suspect: &Suspect) {
    let cases: Vec<&str> = suspect
        .linked_case_reference_numbers
        .iter()
        .map(String::as_str)
        .collect();
    println!(
        "{}  {}  cases: {}",
        suspect.display_name().bold(),
        suspect.id.short_id().dimmed(),
        if cases.is_empty() {
            "none".dimmed().to_string()
        } else {
            cases.join(", ").yellow().to_string()
        }
    );
}

#[derive(Serialize)]
struct DeleteSummary<'a> {
    success: bool,
    message: Option<&'a str>,
    unlinked: usize,
    blob_failures: &'a [String],
}

fn print_delete_outcome(ctx: &Context, what: &str, outcome: &DeleteOutcome) -> anyhow::Result<()> {
    let summary = DeleteSummary {
        success: outcome.success,
        message: outcome.message.as_deref(),
        unlinked: outcome.report.applied().count(),
        blob_failures: &outcome.blob_failures,
    };
    ctx.emit(&summary, || {
        if outcome.success {
            println!(
                "{} {what} deleted ({} links removed)",
                "✓".green().bold(),
                summary.unlinked
            );
        } else {
            println!("{} {what} not deleted", "✗".red().bold());
        }
        if let Some(message) = &outcome.message {
            println!("  {message}");
        }
    })?;
    if !outcome.success {
        bail!("{what} deletion failed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Linking
// ---------------------------------------------------------------------------

async fn cmd_link(ctx: &Context, args: LinkArgs) -> anyhow::Result<()> {
    let suspect_id = SuspectId::new(args.suspect)?;
    let outcome = ctx
        .coordinator
        .link_suspect_by_reference_number(&args.reference, &suspect_id, &ctx.actor)
        .await
        .map_err(failure)?;
    let label = match outcome.result {
        LinkResult::Linked => "linked",
        LinkResult::AlreadyLinked => "already_linked",
        LinkResult::CaseNotFound => "case_not_found",
    };
    let suspect_failures: Vec<String> = outcome
        .propagation
        .failed()
        .map(ToString::to_string)
        .collect();
    let payload = serde_json::json!({
        "result": label,
        "suspectSideFailures": suspect_failures,
    });
    ctx.emit(&payload, || {
        match outcome.result {
            LinkResult::Linked => println!(
                "{} Suspect {} linked to {}",
                "✓".green().bold(),
                suspect_id.short_id(),
                args.reference.yellow()
            ),
            LinkResult::AlreadyLinked => println!("Already linked."),
            LinkResult::CaseNotFound => println!(
                "No case {} yet; nothing linked.",
                args.reference.yellow()
            ),
        }
        for reason in &suspect_failures {
            println!("  {} {reason}", "!".yellow());
        }
    })
}

async fn cmd_suggest(ctx: &Context, args: SuggestArgs) -> anyhow::Result<()> {
    let links = match &args.case {
        Some(id) => {
            ctx.coordinator
                .get_case(&CaseId::new(id.as_str())?)
                .await
                .map_err(failure)?
                .suspect_links
        }
        None => SuspectLinks::new(),
    };

    if args.watch {
        return watch_suggestions(ctx, links).await;
    }
    let Some(reference) = args.reference else {
        bail!("a reference number is required unless --watch is given");
    };

    let mut session = SuggestionSession::new(ctx.settle);
    let now = Instant::now();
    session.observe(&reference, now);
    let ready = session.ready_at().unwrap_or(now);
    let matcher = ctx.coordinator.matcher();
    match session.poll(&matcher, ready, &links).await {
        Some(suggestion) => print_suggestion(ctx, &suggestion),
        None => ctx.emit(&Option::<LinkSuggestion>::None, || {
            println!("No suspects to suggest for {}.", reference.yellow())
        }),
    }
}

/// Treat each stdin line as the reference field's new value.
async fn watch_suggestions(ctx: &Context, links: SuspectLinks) -> anyhow::Result<()> {
    let (ref_tx, ref_rx) = watch::channel(String::new());
    let (_links_tx, links_rx) = watch::channel(links);
    let (tx, mut rx) = mpsc::channel(8);
    let handle = spawn_suggestion_task(ctx.coordinator.matcher(), ctx.settle, ref_rx, links_rx, tx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    ref_tx.send_replace(line);
                }
                None => break,
            },
            Some(suggestion) = rx.recv() => print_suggestion(ctx, &suggestion)?,
        }
    }

    drop(ref_tx);
    while let Some(suggestion) = rx.recv().await {
        print_suggestion(ctx, &suggestion)?;
    }
    handle.await?;
    Ok(())
}

fn print_suggestion(ctx: &Context, suggestion: &LinkSuggestion) -> anyhow::Result<()> {
    ctx.emit(suggestion, || {
        println!("{}", suggestion.message.cyan());
        for m in &suggestion.matches {
            println!("  {} {}", m.id.as_str().dimmed(), m.display_name);
        }
    })
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

async fn cmd_audit(ctx: &Context, args: AuditArgs) -> anyhow::Result<()> {
    if args.verify {
        let report = ChainValidator::validate(ctx.ledger.as_ref()).await?;
        if report.is_valid() {
            println!(
                "{} Audit trail intact ({} entries)",
                "✓".green().bold(),
                report.entry_count
            );
            return Ok(());
        }
        for v in &report.violations {
            println!("  {} seq {}: {:?} {}", "✗".red(), v.seq, v.kind, v.description);
        }
        bail!("{} audit trail violations", report.violations.len());
    }

    let mut query = AuditQuery::new().limit(args.limit);
    if let Some(text) = args.search {
        query = query.text(text);
    }
    if let Some(kind) = args.entity_type {
        query = query.entity_type(kind.into());
    }
    query.entity_id = args.entity_id;

    let entries = ctx.ledger.query(&query).await?;
    ctx.emit(&entries, || {
        if entries.is_empty() {
            println!("No audit entries.");
        }
        for entry in &entries {
            print_entry(entry);
        }
    })
}

fn print_entry(entry: &AuditLogEntry) {
    let action = match entry.action {
        AuditAction::Create => entry.action.as_str().green(),
        AuditAction::Update => entry.action.as_str().yellow(),
        AuditAction::Delete => entry.action.as_str().red(),
        _ => entry.action.as_str().normal(),
    };
    println!(
        "{} {:>6} {} {} {} by {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        format!("#{}", entry.seq).dimmed(),
        action,
        entry.entity_type,
        entry.entity_identifier.bold(),
        entry.actor_name
    );
    println!("    {}", entry.details);
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

async fn read_attachment(path: &Path) -> anyhow::Result<(String, Vec<u8>, &'static str)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    Ok((name, bytes, mime_for_path(path)))
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
