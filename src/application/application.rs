use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::application::RuntimeConfig;
use crate::cli::Cli;
use crate::config::{ConfigError, ViewerConfig};
use crate::connection::{BackoffClock, ConnectionManager, Endpoint, EndpointError};
use crate::session::{Session, SessionError, spawn_stdin_controls};
use crate::view::{Header, Palette, Screen, TreeView};

pub struct Application;

impl Application {
    pub async fn run(cli: Cli) -> Result<(), ApplicationError> {
        let file_config = ViewerConfig::read(cli.config.as_deref())
            .await
            .context(ConfigSnafu)?;
        debug!("Loaded config: {:?}", file_config);

        let config = RuntimeConfig::resolve(cli, file_config);
        debug!("Resolved runtime config: {:?}", config);

        let endpoint = Endpoint::new(
            config.secure,
            &config.host,
            &config.events_prefix,
            &config.path,
        )
        .context(EndpointSnafu)?;
        info!("Watching {} via {}", config.path, endpoint);

        let palette = Palette::new(config.color.apply());
        let manager = ConnectionManager::new(
            endpoint.capability(),
            BackoffClock::default(),
            config.were_back,
        );
        let header = Header {
            name: config.name,
            path: config.path,
        };

        let mut session = Session::new(
            endpoint,
            header,
            palette,
            manager,
            TreeView::new(config.highlight),
            Screen::stdout(),
            spawn_stdin_controls(),
        )
        .with_connect_timeout(config.connect_timeout);
        session.run().await.context(SessionSnafu)?;
        info!(
            "Viewer {} with {} entries shown",
            session.state(),
            session.tree().entry_count()
        );

        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during configuration stage"))]
    ConfigError { source: ConfigError },
    #[snafu(display("The event endpoint could not be built from the configuration"))]
    EndpointError { source: EndpointError },
    #[snafu(display("Critical failure encountered while running the viewer"))]
    SessionError { source: SessionError },
}
