//! Chore Ledger
//!
//! CLI over the chore ledger: template management, the task lifecycle and
//! the long-running daily refresh scheduler.

use anyhow::Result;
use chore_ledger::cli::{Cli, Command, TaskCommand, TemplateCommand};
use chore_ledger::config::Config;
use chore_ledger::db::{Database, now_str};
use chore_ledger::format::{
    OutputFormat, format_board_markdown, format_history_markdown, format_player_markdown,
    format_task_markdown, format_tasks_markdown, format_templates_markdown, to_json,
};
use chore_ledger::generator::{Generation, InstanceGenerator};
use chore_ledger::lifecycle::TaskLifecycle;
use chore_ledger::logging::{self, LogTarget};
use chore_ledger::scheduler::DailyRefresh;
use chore_ledger::types::{NewTemplate, Player, TaskFilter, TemplateUpdate, WeekdaySet};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

/// Everything a command needs.
struct Context {
    config: Config,
    db: Database,
    player: Player,
    format: OutputFormat,
    secret: Option<String>,
}

impl Context {
    fn authorize(&self) -> Result<()> {
        self.config.admin.authorize(self.secret.as_deref())?;
        Ok(())
    }

    fn print<T: Serialize>(&self, value: &T, markdown: impl FnOnce(&T) -> String) {
        match self.format {
            OutputFormat::Json => println!("{}", to_json(value)),
            OutputFormat::Markdown => print!("{}", markdown(value)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(db_path) = &cli.database {
        config.store.db_path = db_path.clone();
    }
    config.ensure_db_dir()?;

    let db = Database::open(&config.store.db_path)?;
    let player = db.ensure_player(&config.player.name, config.player.starting_balance)?;

    let ctx = Context {
        config,
        db,
        player,
        format: cli.format.into(),
        secret: cli.secret,
    };

    match cli.command {
        Command::Serve => run_serve(ctx).await?,
        Command::Refresh => {
            ctx.authorize()?;
            let report = DailyRefresh::new(ctx.db.clone()).run_cycle()?;
            println!(
                "Checked {} daily templates, created {} instances, expired {} tasks, {} failures",
                report.templates_checked,
                report.instances_created.len(),
                report.expired.len(),
                report.failures.len()
            );
        }
        Command::Template(cmd) => run_template(&ctx, cmd)?,
        Command::Task(cmd) => run_task(&ctx, cmd)?,
        Command::Player => {
            let player = ctx.db.get_player(ctx.player.id)?.unwrap_or(ctx.player.clone());
            ctx.print(&player, format_player_markdown);
        }
    }

    Ok(())
}

/// Run the refresh scheduler until Ctrl-C.
async fn run_serve(ctx: Context) -> Result<()> {
    let refresh = DailyRefresh::new(ctx.db.clone());

    if ctx.config.scheduler.refresh_on_startup {
        let startup = refresh.clone();
        match tokio::task::spawn_blocking(move || startup.run_cycle()).await? {
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Startup refresh failed"),
        }
    }

    let scheduler = if ctx.config.scheduler.enabled {
        Some(refresh.spawn())
    } else {
        info!("Daily refresh disabled by configuration");
        None
    };

    info!(db = %ctx.config.store.db_path.display(), "Chore ledger running");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    if let Some(handle) = scheduler {
        handle.abort();
    }
    Ok(())
}

fn run_template(ctx: &Context, cmd: TemplateCommand) -> Result<()> {
    match cmd {
        TemplateCommand::Add(args) => {
            ctx.authorize()?;
            let repeat_days = match args.repeat_days.as_deref() {
                Some(raw) => raw.parse::<WeekdaySet>()?,
                None => WeekdaySet::empty(),
            };
            let template = NewTemplate {
                title: args.title,
                description: args.description,
                difficulty: args.difficulty.into(),
                kind: args.kind.into(),
                reward: args.reward,
                repeat_days,
            };
            let (template_id, outcome) = InstanceGenerator::new(ctx.db.clone())
                .create_and_instantiate(
                    &template,
                    args.expiry.as_deref(),
                    args.start.as_deref(),
                )?;
            match outcome {
                Generation::Created(task_id) => {
                    println!("Created template {} with task {}", template_id, task_id)
                }
                other => println!("Created template {} ({:?})", template_id, other),
            }
        }
        TemplateCommand::List { kind } => {
            let templates = ctx.db.list_templates(kind.map(Into::into))?;
            ctx.print(&templates, |t| format_templates_markdown(t));
        }
        TemplateCommand::Update(args) => {
            ctx.authorize()?;
            let update = TemplateUpdate {
                title: args.title,
                description: args.description,
                difficulty: args.difficulty.map(Into::into),
                reward: args.reward,
                repeat_days: args
                    .repeat_days
                    .as_deref()
                    .map(str::parse::<WeekdaySet>)
                    .transpose()?,
            };
            let template = ctx.db.update_template(args.id, &update)?;
            ctx.print(&template, |t| format_templates_markdown(std::slice::from_ref(t)));
        }
        TemplateCommand::Delete { id } => {
            ctx.authorize()?;
            ctx.db.delete_template(id)?;
            println!("Deleted template {}", id);
        }
    }
    Ok(())
}

fn run_task(ctx: &Context, cmd: TaskCommand) -> Result<()> {
    let lifecycle = TaskLifecycle::new(ctx.db.clone());

    match cmd {
        TaskCommand::Board => {
            let board = ctx.db.task_board(ctx.player.id, &now_str())?;
            ctx.print(&board, format_board_markdown);
        }
        TaskCommand::List {
            status,
            template,
            player,
        } => {
            let filter = TaskFilter {
                statuses: status.into_iter().map(Into::into).collect(),
                player_id: player,
                template_id: template,
            };
            let tasks = ctx.db.list_tasks(&filter)?;
            ctx.print(&tasks, |t| format_tasks_markdown(t));
        }
        TaskCommand::History { id } => {
            let events = ctx.db.task_history(id)?;
            ctx.print(&events, |e| format_history_markdown(e));
        }
        TaskCommand::Claim { id } => {
            let task = lifecycle.claim(id, ctx.player.id)?;
            ctx.print(&task, format_task_markdown);
        }
        TaskCommand::Complete { id } => {
            let task = lifecycle.complete(id, ctx.player.id)?;
            ctx.print(&task, format_task_markdown);
        }
        TaskCommand::Verify { id } => {
            ctx.authorize()?;
            let task = lifecycle.verify(id)?;
            ctx.print(&task, format_task_markdown);
        }
        TaskCommand::Delete { id } => {
            ctx.authorize()?;
            ctx.db.delete_task(id)?;
            println!("Deleted task {}", id);
        }
    }
    Ok(())
}
