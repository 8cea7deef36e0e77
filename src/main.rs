use dotenvy::dotenv;
use reddit_media_relay::bot::handlers::{self, Command};
use reddit_media_relay::bot::{MessageRelay, UnauthorizedCache};
use reddit_media_relay::config::{
    get_unauthorized_cache_max_size, get_unauthorized_cache_ttl, get_unauthorized_cooldown,
    AllowList, Settings,
};
use reddit_media_relay::downloader::BdfrDownloader;
use reddit_media_relay::link::HttpLinkResolver;
use reddit_media_relay::logging::init_logging;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    init_logging();

    info!("Starting Reddit media relay...");

    let settings = init_settings();
    let allow_list = init_allow_list(&settings);

    let resolver = HttpLinkResolver::new(Duration::from_secs(settings.resolve_timeout_secs))?;
    let downloader = BdfrDownloader::new(settings.downloader_program.clone());
    info!(
        program = %settings.downloader_program,
        scratch_root = %settings.download_dir.display(),
        "Downloader configured"
    );

    let relay = Arc::new(MessageRelay::new(
        allow_list,
        init_unauthorized_cache(),
        Arc::new(resolver),
        Arc::new(downloader),
        settings.download_dir.clone(),
    ));

    let bot = Bot::new(settings.telegram_token.clone());
    register_commands(&bot).await;

    info!("Bot has started...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![relay])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_allow_list(settings: &Settings) -> Arc<AllowList> {
    match settings.load_allow_list() {
        Ok(list) => {
            if list.is_empty() {
                warn!("Allow-list is empty; every request will be rejected");
            }
            Arc::new(list)
        }
        Err(e) => {
            error!("Failed to load allow-list: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_unauthorized_cache() -> Arc<UnauthorizedCache> {
    let cooldown = get_unauthorized_cooldown();
    let ttl = get_unauthorized_cache_ttl();
    let max_size = get_unauthorized_cache_max_size();

    info!(
        "Initializing UnauthorizedCache (cooldown: {}s, ttl: {}s, max_size: {})",
        cooldown, ttl, max_size
    );

    Arc::new(UnauthorizedCache::new(cooldown, ttl, max_size))
}

async fn register_commands(bot: &Bot) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some_and(handlers::is_relay_text))
                .endpoint(handle_text),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    relay: Arc<MessageRelay>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::handle_text(bot, msg, relay).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}
