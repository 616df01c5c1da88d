use anyhow::Context;
use booking_desk::bookings::Created;
use booking_desk::export;
use booking_desk::points::HistoryFilter;
use booking_desk::preferences::{HourlyDraft, OtherDraft, SessionProfile, ThemeName};
use booking_desk::{Config, DeskState, print_banner};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, Text};
use shared::models::{Booking, BookingUpdate, PointsDirection, PointsRecord};
use shared::notification::{DEFAULT_CANCEL_REASON, format_vnd};
use shared::query::{BookingQuery, PaginatedResponse, StatusFilter};
use shared::Transition;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "booking-desk")]
#[command(about = "Back-office for the home-cleaning booking service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Approval list, status changes, exports
    Bookings {
        #[command(subcommand)]
        command: BookingCommand,
    },
    /// Customer points and history
    Points {
        #[command(subcommand)]
        command: PointsCommand,
    },
    /// Theme, banners, session
    Prefs {
        #[command(subcommand)]
        command: PrefsCommand,
    },
    /// Notification queue
    Outbox {
        #[command(subcommand)]
        command: OutboxCommand,
    },
    /// Notification channel
    Notify {
        #[command(subcommand)]
        command: NotifyCommand,
    },
}

#[derive(Args)]
struct ListFilter {
    /// all | pending | confirmed | completed | cancelled
    #[arg(long, default_value = "all")]
    status: StatusFilter,
    /// Substring of the customer name
    #[arg(long)]
    name: Option<String>,
    /// Substring of the phone
    #[arg(long)]
    phone: Option<String>,
}

impl ListFilter {
    fn query(&self, page: u32) -> BookingQuery {
        let mut query = BookingQuery::new().with_status(self.status).with_page(page);
        query.name = self.name.clone();
        query.phone = self.phone.clone();
        query
    }
}

#[derive(Subcommand)]
enum BookingCommand {
    /// One page of the approval list
    List {
        #[command(flatten)]
        filter: ListFilter,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// A customer's bookings of the last six months
    Schedule {
        phone: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Show {
        id: i64,
    },
    /// Submit a new booking
    Create {
        #[command(subcommand)]
        form: CreateForm,
    },
    Confirm {
        id: i64,
    },
    Complete {
        id: i64,
    },
    Cancel {
        id: i64,
        /// Prompted for when omitted
        #[arg(long)]
        reason: Option<String>,
    },
    /// Queue a reminder message
    Remind {
        id: i64,
    },
    /// Edit details (not the status)
    Edit {
        id: i64,
        #[command(flatten)]
        update: EditArgs,
    },
    /// Write the filtered list to CSV
    Export {
        #[command(flatten)]
        filter: ListFilter,
        /// Output directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

/// Fields left out keep the saved draft's value
#[derive(Subcommand)]
enum CreateForm {
    /// Hourly cleaning
    Hourly {
        /// dd/mm/yyyy or yyyy-mm-dd
        #[arg(long)]
        date: String,
        #[arg(long)]
        hour: Option<u32>,
        #[arg(long)]
        minute: Option<u32>,
        /// Hours, at least 2
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long)]
        staff: Option<u32>,
        #[command(flatten)]
        customer: CustomerArgs,
        #[arg(long)]
        zalo_id: Option<String>,
    },
    /// Any other service, quoted on site
    Other {
        #[arg(long)]
        service: String,
        #[arg(long)]
        date: String,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        quantity: Option<u32>,
        #[arg(long)]
        size: Option<String>,
        #[command(flatten)]
        customer: CustomerArgs,
    },
}

#[derive(Args)]
struct CustomerArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    note: Option<String>,
}

#[derive(Args)]
struct EditArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    time: Option<String>,
    #[arg(long)]
    service: Option<String>,
    /// VND
    #[arg(long)]
    total: Option<i64>,
    #[arg(long)]
    staff: Option<u32>,
    #[arg(long)]
    note: Option<String>,
}

impl From<EditArgs> for BookingUpdate {
    fn from(args: EditArgs) -> Self {
        Self {
            name: args.name,
            phone: args.phone,
            address: args.address,
            date: args.date,
            time: args.time,
            service: args.service,
            total: args.total,
            staff: args.staff,
            note: args.note,
        }
    }
}

#[derive(Args)]
struct HistoryArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
}

impl HistoryArgs {
    fn filter(&self) -> HistoryFilter {
        HistoryFilter::new(self.name.clone(), self.phone.clone())
    }
}

#[derive(Subcommand)]
enum PointsCommand {
    /// All customers, or one by phone
    Show { phone: Option<String> },
    /// Manual adjustment
    Adjust {
        phone: String,
        /// add | subtract
        direction: String,
        amount: String,
    },
    /// Last six months, newest first
    History {
        #[command(flatten)]
        filter: HistoryArgs,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Delete records older than six months
    Prune {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    Export {
        #[command(flatten)]
        filter: HistoryArgs,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Is the periodic export reminder due?
    Reminder {
        /// Mark the reminder as seen
        #[arg(long)]
        ack: bool,
    },
}

#[derive(Subcommand)]
enum PrefsCommand {
    /// Every stored key
    Get,
    SetTheme {
        /// teal | rose | purple | amber | emerald | sky
        name: String,
    },
    SetBanner {
        /// 0..2
        slot: usize,
        /// Image data URI
        data_uri: String,
    },
    ClearBanner {
        slot: usize,
    },
    SignIn {
        #[arg(long)]
        phone: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        user_id: String,
    },
    SignOut,
    /// Check whether the signed-in user is an admin
    Admin,
    /// Migrate a JSON dump of the old flat key/value layout
    ImportLegacy { file: PathBuf },
}

#[derive(Subcommand)]
enum OutboxCommand {
    /// Queue sizes, or one booking's latest notification
    Status {
        #[arg(long)]
        booking: Option<i64>,
    },
    /// Send what is due now
    Drain {
        /// Ignore retry backoff
        #[arg(long)]
        now: bool,
    },
    /// Move dead letters back to the queue
    Recover,
    /// Run the worker until Ctrl+C
    Watch,
}

#[derive(Subcommand)]
enum NotifyCommand {
    /// Show token / simulation state
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv, 配置, 日志)
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env();
    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("Failed to create work dir {}", config.work_dir))?;
    let log_dir = config.log_dir().to_string_lossy().to_string();
    booking_desk::init_logger_with_file(&config.log_level, config.log_json, Some(&log_dir))?;

    // 2. 状态
    let state = DeskState::initialize(&config)?;

    let result = match cli.command {
        Commands::Bookings { command } => bookings(&state, command).await,
        Commands::Points { command } => points(&state, command).await,
        Commands::Prefs { command } => prefs(&state, command),
        Commands::Outbox { command } => outbox(&state, command).await,
        Commands::Notify {
            command: NotifyCommand::Check,
        } => {
            let report = state.notifier.check_connection();
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    };

    let Err(err) = result else {
        return Ok(());
    };
    match booking_desk::core::classify(err) {
        Ok(app) => {
            let category = app.code.category();
            tracing::error!(code = %app.code, category = category.as_str(), "{}", app.message);
            eprintln!("{} [{}] {}", app.code.tag(), category.as_str(), app.message);
            for (key, value) in &app.details {
                eprintln!("  {}: {}", key, value);
            }
            std::process::exit(1);
        }
        Err(other) => Err(other),
    }
}

async fn bookings(state: &DeskState, command: BookingCommand) -> anyhow::Result<()> {
    let report = state.refresh_bookings().await?;
    if let Some(error) = &report.error {
        println!("API unreachable ({error}), showing the built-in list");
    }

    match command {
        BookingCommand::List { filter, page } => {
            let result = state.store.query(&filter.query(page));
            print_bookings(&result);
        }
        BookingCommand::Schedule { phone, page } => {
            let today = Local::now().date_naive();
            print_bookings(&state.store.schedule(&phone, today, page));
        }
        BookingCommand::Show { id } => {
            let booking = state
                .store
                .get(id)
                .with_context(|| format!("Booking {id} not found"))?;
            print_booking_detail(&booking);
            if let Some(status) = state.delivery_status(id)? {
                println!("  notification: {} ({})", status.label(), status.kind().as_str());
            }
        }
        BookingCommand::Create { form } => {
            let created = create(state, form).await?;
            println!(
                "Created booking {} ({}) {:?}",
                created.booking.id,
                created.booking.code(),
                created.origin
            );
        }
        BookingCommand::Confirm { id } => {
            let transition = state.manager.confirm(id)?;
            print_transition(id, transition);
            drain(state).await;
        }
        BookingCommand::Complete { id } => {
            let transition = state.manager.complete(id)?;
            print_transition(id, transition);
            if let Some(b) = state.store.get(id) {
                println!("  points: {}", b.points());
            }
            drain(state).await;
        }
        BookingCommand::Cancel { id, reason } => {
            let reason = match reason {
                Some(r) => r,
                None => Text::new("Cancellation reason:")
                    .with_default(DEFAULT_CANCEL_REASON)
                    .prompt()?,
            };
            let transition = state.manager.cancel(id, &reason)?;
            print_transition(id, transition);
            drain(state).await;
        }
        BookingCommand::Remind { id } => {
            state.manager.remind(id)?;
            println!("Reminder queued for booking {id}");
            drain(state).await;
        }
        BookingCommand::Edit { id, update } => {
            let booking = state.manager.update_details(id, &update.into())?;
            print_booking_detail(&booking);
        }
        BookingCommand::Export { filter, dir } => {
            let rows = state.store.filtered(&filter.query(1));
            let status = match filter.status {
                StatusFilter::All => None,
                StatusFilter::Only(s) => Some(s.as_str()),
            };
            let path = dir.join(export::bookings_file_name(Local::now().date_naive(), status));
            let count = export::export_to_file(&path, &rows, export::write_bookings_csv)?;
            println!("Exported {count} bookings to {}", path.display());
        }
    }
    Ok(())
}

async fn create(state: &DeskState, form: CreateForm) -> anyhow::Result<Created> {
    let prefs = &state.preferences;
    match form {
        CreateForm::Hourly {
            date,
            hour,
            minute,
            duration,
            staff,
            customer,
            zalo_id,
        } => {
            let mut draft = prefs.get::<HourlyDraft>()?;
            draft.date = date;
            draft.hour = hour.unwrap_or(draft.hour);
            draft.minute = minute.unwrap_or(draft.minute);
            draft.duration = duration.unwrap_or(draft.duration);
            draft.staff = staff.unwrap_or(draft.staff);
            draft.zalo_id = zalo_id.unwrap_or(draft.zalo_id);
            customer.fill(
                &mut draft.name,
                &mut draft.phone,
                &mut draft.address,
                &mut draft.note,
            );
            prefs.set::<HourlyDraft>(&draft)?;

            let quote = draft.quote();
            println!(
                "Price {} ({} points)",
                format_vnd(quote.price),
                quote.points
            );
            let created = state.store.create(draft.to_draft()?).await?;
            prefs.set::<HourlyDraft>(&draft.after_submit())?;
            Ok(created)
        }
        CreateForm::Other {
            service,
            date,
            time,
            quantity,
            size,
            customer,
        } => {
            let mut draft = prefs.get::<OtherDraft>()?;
            draft.service = service;
            draft.date = date;
            draft.time = time.unwrap_or(draft.time);
            draft.quantity = quantity.unwrap_or(draft.quantity);
            draft.size = size.unwrap_or(draft.size);
            customer.fill(
                &mut draft.name,
                &mut draft.phone,
                &mut draft.address,
                &mut draft.note,
            );
            prefs.set::<OtherDraft>(&draft)?;

            let created = state.store.create(draft.to_draft()?).await?;
            prefs.set::<OtherDraft>(&draft.after_submit())?;
            Ok(created)
        }
    }
}

impl CustomerArgs {
    fn fill(self, name: &mut String, phone: &mut String, address: &mut String, note: &mut String) {
        for (arg, field) in [
            (self.name, name),
            (self.phone, phone),
            (self.address, address),
            (self.note, note),
        ] {
            if let Some(value) = arg {
                *field = value;
            }
        }
    }
}

async fn points(state: &DeskState, command: PointsCommand) -> anyhow::Result<()> {
    let ledger = &state.ledger;
    let now = Local::now();
    match command {
        PointsCommand::Show { phone: Some(phone) } => {
            let customer = ledger
                .find_customer(&phone)?
                .with_context(|| format!("No customer with phone {phone}"))?;
            println!("{}  {}  {} points", customer.phone, customer.name, customer.points);
        }
        PointsCommand::Show { phone: None } => {
            for c in ledger.customers()? {
                println!("{:<12} {:<20} {:>6}", c.phone, c.name, c.points);
            }
        }
        PointsCommand::Adjust {
            phone,
            direction,
            amount,
        } => {
            let direction: PointsDirection = booking_desk::points::parse_direction(&direction)?;
            let record = ledger.adjust(&phone, direction, &amount)?;
            println!(
                "{} {} → {} points",
                record.phone,
                record.change_label(),
                record.new_total
            );
            drain(state).await;
        }
        PointsCommand::History { filter, page } => {
            let result = ledger.history(&filter.filter(), page, now)?;
            print_history(&result);
        }
        PointsCommand::Prune { yes } => {
            let proceed = yes
                || Confirm::new("Delete points history older than six months?")
                    .with_default(false)
                    .prompt()?;
            if proceed {
                let removed = ledger.prune_older_than_six_months(now)?;
                println!("Removed {removed} records");
            }
        }
        PointsCommand::Export { filter, dir } => {
            let (path, count) = ledger.export_history(&dir, &filter.filter(), now)?;
            println!("Exported {count} records to {}", path.display());
        }
        PointsCommand::Reminder { ack } => {
            if ack {
                ledger.acknowledge_reminder(now)?;
                println!("Reminder acknowledged");
            } else if ledger.reminder_due(now)? {
                println!("Points history export is due");
            } else {
                println!("No reminder due");
            }
        }
    }
    Ok(())
}

fn prefs(state: &DeskState, command: PrefsCommand) -> anyhow::Result<()> {
    let prefs = &state.preferences;
    match command {
        PrefsCommand::Get => {
            println!("{}", serde_json::to_string_pretty(&prefs.dump()?)?);
        }
        PrefsCommand::SetTheme { name } => {
            let theme: ThemeName = prefs.set_theme(&name)?;
            println!("Theme: {} ({})", theme.display_name(), theme.primary_color());
        }
        PrefsCommand::SetBanner { slot, data_uri } => {
            prefs.set_banner(slot, data_uri)?;
            println!("Banner {slot} set");
        }
        PrefsCommand::ClearBanner { slot } => {
            prefs.clear_banner(slot)?;
            println!("Banner {slot} cleared");
        }
        PrefsCommand::SignIn {
            phone,
            name,
            user_id,
        } => {
            prefs.sign_in(&SessionProfile {
                user_id,
                name,
                avatar: String::new(),
                phone,
            })?;
            println!("Signed in, admin: {}", state.check_admin()?);
        }
        PrefsCommand::SignOut => {
            prefs.sign_out()?;
            println!("Signed out");
        }
        PrefsCommand::Admin => {
            println!("admin: {}", state.check_admin()?);
        }
        PrefsCommand::ImportLegacy { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let report = prefs.import_legacy(&json)?;
            println!(
                "Migrated {:?}, skipped {:?}, {} points records",
                report.migrated, report.skipped, report.points_records
            );
        }
    }
    Ok(())
}

async fn outbox(state: &DeskState, command: OutboxCommand) -> anyhow::Result<()> {
    match command {
        OutboxCommand::Status { booking: Some(id) } => match state.delivery_status(id)? {
            Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
            None => println!("No notification for booking {id}"),
        },
        OutboxCommand::Status { booking: None } => {
            let stats = state.storage.get_outbox_stats()?;
            println!(
                "pending: {}  dead_letter: {}  delivered: {}",
                stats.pending, stats.dead_letter, stats.delivered
            );
            for letter in state.storage.get_dead_letters()? {
                println!("  dead {} {}", letter.entry.id, letter.last_error);
            }
        }
        OutboxCommand::Drain { now } => {
            let report = state.drain_outbox(now).await;
            println!("{report:?}");
        }
        OutboxCommand::Recover => {
            let recovered = state.storage.recover_dead_letters()?;
            println!("Recovered {recovered} notifications");
        }
        OutboxCommand::Watch => {
            print_banner();
            let Some(handle) = state.start_background_tasks() else {
                anyhow::bail!("Outbox worker already running");
            };
            booking_desk::devrun::shutdown_signal().await;
            handle.abort();
        }
    }
    Ok(())
}

/// Send what the last change queued; failures stay queued for retry
async fn drain(state: &DeskState) {
    let report = state.drain_outbox(false).await;
    if report.attempted == 0 {
        return;
    }
    if report.delivered == report.attempted {
        println!("  notification sent");
    } else {
        println!(
            "  notification not sent ({} failed, {} dead-lettered), queued for retry",
            report.failed, report.dead_lettered
        );
    }
}

fn print_transition(id: i64, transition: Transition) {
    match transition {
        Transition::Changed { from, to } => println!("Booking {id}: {from} → {to}"),
        Transition::Unchanged(status) => println!("Booking {id} is already {status}"),
    }
}

fn print_bookings(result: &PaginatedResponse<Booking>) {
    if result.is_empty() {
        println!("No bookings");
        return;
    }
    for b in &result.data {
        println!(
            "{:>6}  {:<11} {:<10} {:<10} {:<5} {:<20} {:<11} {:>12}",
            b.id,
            b.code(),
            b.status.as_str(),
            b.date(),
            b.core.time,
            b.name(),
            b.phone(),
            format_vnd(b.core.total)
        );
    }
    println!(
        "page {}/{} ({} total)  {:?}",
        result.page,
        result.total_pages,
        result.total,
        result.window()
    );
}

fn print_booking_detail(b: &Booking) {
    println!("#{} {} [{}]", b.id, b.code(), b.status.as_str());
    println!("  customer: {} {}", b.name(), b.phone());
    println!("  address:  {}", b.core.address);
    println!("  when:     {} {}", b.date(), b.core.time);
    println!("  service:  {} {}", b.core.service, b.core.detail.label());
    println!("  staff:    {}", b.core.staff);
    println!("  total:    {} ({} points)", format_vnd(b.core.total), b.points());
    if !b.core.note.is_empty() {
        println!("  note:     {}", b.core.note);
    }
    let actions: Vec<&str> = b.status.available_actions().iter().map(|a| a.as_str()).collect();
    if actions.is_empty() {
        println!("  actions:  none");
    } else {
        println!("  actions:  {}", actions.join(", "));
    }
}

fn print_history(result: &PaginatedResponse<PointsRecord>) {
    if result.is_empty() {
        println!("No points history");
        return;
    }
    for r in &result.data {
        println!(
            "{:<16} {:<12} {:<20} {:>6} {:>6}  {}",
            r.time_label(),
            r.phone,
            r.name,
            r.change_label(),
            r.new_total,
            r.reason
        );
    }
    println!(
        "page {}/{} ({} total)",
        result.page, result.total_pages, result.total
    );
}
