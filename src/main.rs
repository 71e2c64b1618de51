use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use classwatch::api::ApiClient;
use classwatch::auth::{self, TokenStore};
use classwatch::presentation;
use classwatch::reports;
use classwatch::students::{self, Photo, StudentForm};
use classwatch::users::{self, NewUser, UserUpdate};
use classwatch::{create_router, AppState, Config, FrameStore, MjpegSink, StreamController};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "classwatch", version, about = "School behavior monitor client")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, short, default_value = "config/classwatch")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the token
    Login {
        /// Backend host, e.g. http://192.168.0.166:8000
        #[arg(long)]
        server: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored token
    Logout,
    /// List detection sessions
    Sessions,
    /// Show recorded behaviors for a student
    Report { student_id: i64 },
    /// Open the live stream page and serve the local control API
    Watch {
        /// Use exam mode for `--start` and for start requests that omit `is_exam`
        #[arg(long)]
        exam: bool,
        /// Start a session right away if none is active
        #[arg(long)]
        start: bool,
    },
    /// Manage student records
    Students {
        #[command(subcommand)]
        action: StudentAction,
    },
    /// Manage teacher and parent accounts
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum StudentAction {
    List,
    Show {
        id: i64,
    },
    /// Register a student; the photo is used for face recognition
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        class: Option<String>,
        /// Parent account, created if it does not exist
        #[arg(long)]
        parent_email: Option<String>,
        #[arg(long)]
        photo: PathBuf,
    },
    /// Change only the fields given
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        parent_email: Option<String>,
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    Rm {
        id: i64,
    },
}

#[derive(Subcommand)]
enum UserAction {
    List,
    Show {
        id: i64,
    },
    /// Who the stored token belongs to
    Me,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        teacher: bool,
    },
    /// Change only the fields given; an empty password keeps the old one
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        teacher: Option<bool>,
    },
    Rm {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    let store = TokenStore::new(cfg.token_path()?);

    match cli.command {
        Command::Login {
            server,
            email,
            password,
        } => {
            let creds = auth::login(&server, &email, &password, cfg.timeout()).await?;
            store.save(&creds)?;
            info!("Credentials saved to {}", store.path().display());
        }
        Command::Logout => {
            store.clear()?;
            info!("Logged out");
        }
        Command::Sessions => {
            let client = authenticated_client(&cfg, &store)?;
            for summary in reports::session_history(&client).await? {
                println!("{:<16} {}", summary.title, summary.status);
            }
        }
        Command::Report { student_id } => {
            let client = authenticated_client(&cfg, &store)?;
            let report = reports::student_report(&client, student_id).await?;
            println!(
                "{} ({})",
                report.student.full_name,
                report.student.class_name.as_deref().unwrap_or("-")
            );
            for record in &report.behaviors {
                let when = record
                    .timestamp
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {:<28} {}", when, record.behavior);
            }
            for (behavior, count) in report.tally() {
                println!("{:>6}  {}", count, behavior);
            }
        }
        Command::Watch { exam, start } => {
            let client = authenticated_client(&cfg, &store)?;
            watch(&cfg, &store, client, exam, start).await?;
        }
        Command::Students { action } => {
            let client = authenticated_client(&cfg, &store)?;
            run_students(&client, action).await?;
        }
        Command::Users { action } => {
            let client = authenticated_client(&cfg, &store)?;
            run_users(&client, action).await?;
        }
    }

    Ok(())
}

fn print_student(student: &classwatch::api::Student) {
    println!(
        "{:>5}  {:<28} {:<6} parent={}",
        student.id,
        student.full_name,
        student.class_name.as_deref().unwrap_or("-"),
        student
            .parent_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
}

fn print_user(user: &classwatch::api::User) {
    let role = if user.is_teacher { "teacher" } else { "parent" };
    println!("{:>5}  {:<24} {:<32} {}", user.id, user.name, user.email, role);
}

async fn run_students(client: &ApiClient, action: StudentAction) -> Result<()> {
    match action {
        StudentAction::List => {
            for student in students::list(client).await? {
                print_student(&student);
            }
        }
        StudentAction::Show { id } => print_student(&students::get(client, id).await?),
        StudentAction::Add {
            name,
            class,
            parent_email,
            photo,
        } => {
            let form = StudentForm {
                full_name: Some(name),
                class_name: class,
                parent_email,
                photo: Some(Photo::from_path(&photo)?),
            };
            print_student(&students::add(client, form).await?);
        }
        StudentAction::Edit {
            id,
            name,
            class,
            parent_email,
            photo,
        } => {
            let form = StudentForm {
                full_name: name,
                class_name: class,
                parent_email,
                photo: photo.as_deref().map(Photo::from_path).transpose()?,
            };
            print_student(&students::update(client, id, form).await?);
        }
        StudentAction::Rm { id } => students::delete(client, id).await?,
    }
    Ok(())
}

async fn run_users(client: &ApiClient, action: UserAction) -> Result<()> {
    match action {
        UserAction::List => {
            for user in users::list(client).await? {
                print_user(&user);
            }
        }
        UserAction::Show { id } => print_user(&users::get(client, id).await?),
        UserAction::Me => {
            let me = users::me(client).await?;
            let role = if me.is_teacher { "teacher" } else { "parent" };
            println!("{} {} ({})", me.sub, me.email.as_deref().unwrap_or("-"), role);
        }
        UserAction::Add {
            name,
            email,
            password,
            teacher,
        } => {
            let user = NewUser {
                name,
                email,
                password,
                is_teacher: teacher,
            };
            print_user(&users::add(client, user).await?);
        }
        UserAction::Edit {
            id,
            name,
            email,
            password,
            teacher,
        } => {
            let update = UserUpdate {
                name,
                email,
                password,
                is_teacher: teacher,
            };
            print_user(&users::update(client, id, update).await?);
        }
        UserAction::Rm { id } => users::delete(client, id).await?,
    }
    Ok(())
}

fn authenticated_client(cfg: &Config, store: &TokenStore) -> Result<ApiClient> {
    let Some(creds) = store.load()? else {
        bail!("Not logged in. Run `classwatch login` first.");
    };

    let base_url = cfg.backend.base_url.as_deref().unwrap_or(&creds.base_url);
    Ok(ApiClient::new(
        Some(base_url),
        Some(creds.token),
        cfg.timeout(),
    )?)
}

async fn watch(
    cfg: &Config,
    store: &TokenStore,
    client: ApiClient,
    exam: bool,
    start: bool,
) -> Result<()> {
    let frames = FrameStore::new();
    let (events_tx, events_rx) = mpsc::channel(16);
    let sink = Arc::new(MjpegSink::new(frames.clone(), events_tx)?);
    let controller = Arc::new(StreamController::new(Arc::new(client), sink));

    tokio::spawn(Arc::clone(&controller).watch(events_rx));

    match controller.enter().await {
        Ok(state) => info!("Stream page ready ({})", state.name()),
        Err(e) if e.requires_login() => {
            store.clear()?;
            bail!("{}. Run `classwatch login` again.", e.message());
        }
        Err(e) => warn!("Could not sync with backend: {}", e.message()),
    }

    if start {
        if let Err(e) = controller.start(exam).await {
            warn!("Start failed: {}", e.message());
        }
    }

    let view = presentation::render(&controller.snapshot().await);
    info!("{} [{}]", view.status_text, view.button_label);

    let state = AppState::new(Arc::clone(&controller), frames).with_exam_default(exam);
    let router = create_router(state);
    let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Control API listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await?;

    controller.leave().await;
    Ok(())
}
