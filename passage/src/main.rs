mod config;

use std::{net::TcpListener, path::Path, time::Duration};

use anyhow::Context as _;
use base64::Engine as _;
use log::{debug, info, warn};

use passage_util::connection::Connection;

use crate::config::Config;

const CONFIG_PATH: &str = "passage.toml";
const FAVICON_PATH: &str = "server-icon.png";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::read(CONFIG_PATH).context("Failed to read proxy configuration")?;
    if !config.validate() {
        anyhow::bail!("Invalid configuration, refusing to start");
    }

    let favicon = load_favicon().context("Failed to load server icon")?;
    info!(
        "Serving motd {:?} with {} advertised slots{}",
        config.motd,
        config.show_max_players,
        if favicon.is_some() {
            " and a server icon"
        } else {
            ""
        }
    );

    let listener = TcpListener::bind(&config.bind)
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    listener.set_nonblocking(true)?;
    info!("Listening on {}", listener.local_addr()?);

    let mut connections: Vec<Connection> = Vec::new();
    loop {
        std::thread::sleep(Duration::from_millis(1));

        while let Ok((stream, address)) = listener.accept() {
            if config.enable_player_address_logging {
                info!("Incoming connection from {address}");
            } else {
                info!("Incoming connection");
            }
            match Connection::new(stream) {
                Ok(connection) => connections.push(connection),
                Err(err) => warn!("Failed to set up connection: {err}"),
            }
        }

        connections.retain_mut(|connection| {
            loop {
                match connection.receive() {
                    Ok(Some(packet)) => {
                        debug!("Discarding pre-session packet {:#04X}", packet.id)
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!("Dropping connection: {err}");
                        connection.close();
                        break;
                    }
                }
            }
            if let Err(err) = connection.flush_outgoing() {
                warn!("Dropping connection: {err}");
                connection.close();
            }
            !connection.is_closed()
        });
    }
}

/// `server-icon.png` from the working directory, as the base64 data URL
/// the server list expects, if present.
fn load_favicon() -> anyhow::Result<Option<String>> {
    if !Path::new(FAVICON_PATH).exists() {
        return Ok(None);
    }
    let icon = image::open(FAVICON_PATH)?;
    let icon = icon.resize_exact(64, 64, image::imageops::FilterType::Lanczos3);
    let mut png = std::io::Cursor::new(Vec::new());
    icon.write_to(&mut png, image::ImageFormat::Png)?;
    Ok(Some(format!(
        "data:image/png;base64,{}",
        base64::prelude::BASE64_STANDARD.encode(png.into_inner())
    )))
}
