use mandrill_builder::{Mailer, MandrillConfig, SendOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(template) = args.next() else {
        eprintln!("Usage: mandrill-send <template> <recipient>...");
        eprintln!("  export MANDRILL_API_KEY=...");
        std::process::exit(2);
    };
    let recipients: Vec<String> = args.collect();
    if recipients.is_empty() {
        eprintln!("Error: at least one recipient is required");
        std::process::exit(2);
    }

    let config = MandrillConfig::from_env()?;
    let mailer = Mailer::from_config(&config)?;

    eprintln!("📮 mandrill-send v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Endpoint: {}", config.endpoint);
    eprintln!("   Template: {}", template);
    if let Some(interceptor) = &config.interceptor {
        eprintln!("   Intercepting to: {}", interceptor);
    }
    if config.skip {
        eprintln!("   Skip: enabled (no API calls)");
    }

    let mut message = mailer.message(template);
    if let Ok(subject) = std::env::var("MANDRILL_SUBJECT") {
        message = message.subject(subject);
    }
    if let Ok(from) = std::env::var("MANDRILL_FROM") {
        message = message.from(&from);
    }
    for recipient in &recipients {
        message = message.to(recipient);
    }

    match mailer.send(&message).await? {
        SendOutcome::Skipped => eprintln!("Skipped."),
        SendOutcome::Intercepted { dispatched } => {
            eprintln!("Intercepted: {} copies delivered", dispatched);
        }
        SendOutcome::Delivered(statuses) => {
            for status in statuses {
                println!(
                    "{}\t{}",
                    status.email.as_deref().unwrap_or("-"),
                    status.status.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}
