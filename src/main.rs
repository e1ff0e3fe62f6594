use anyhow::Result;
use clap::Parser;
use shell_kit::{Config, KeyEvent, ShellApp};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "shell-kit")]
#[command(about = "Горячие клавиши и сохранение состояния окна десктопной оболочки")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "shell-kit.toml")]
    config: String,

    /// Файл состояния (перекрывает store.state_url)
    #[arg(long)]
    state: Option<String>,

    /// Уровень логирования
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let mut config = Config::load(&args.config)?;
    if let Some(state) = args.state {
        config.store.state_url = state;
    }

    // Инициализация системы логирования
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    info!("Запуск shell-kit v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    let app = ShellApp::new(Arc::new(config));
    app.load_state()?;
    app.install_shortcuts()?;

    info!("Введите комбинации клавиш (например ctrl+s или f5), Ctrl+D для выхода");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => handle_line(&app, line.trim()),
                    Ok(None) => {
                        info!("Ввод закрыт");
                        break;
                    }
                    Err(e) => {
                        error!("Ошибка чтения ввода: {}", e);
                        break;
                    }
                }
            }
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
                    Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
                }
                break;
            }
        }
    }

    info!("Завершение работы...");
    app.shutdown().await;

    info!("shell-kit завершил работу");
    Ok(())
}

fn handle_line(app: &ShellApp, line: &str) {
    if line.is_empty() {
        return;
    }

    match line.parse::<KeyEvent>() {
        Ok(event) => {
            let outcome = app.dispatch(&event);
            if outcome.result.is_none() {
                info!("{}: нет горячей клавиши", event);
            }
        }
        Err(e) => warn!("{}", e),
    }
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if format == "pretty" {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
