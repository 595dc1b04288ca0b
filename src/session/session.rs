use std::io::{self, Write};
use std::pin::pin;
use std::time::{Duration, Instant};

use futures::{FutureExt, StreamExt, select_biased};
use futures_channel::mpsc::UnboundedReceiver;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::connection::{
    Action, ChannelEvent, ConnectionManager, ConnectionState, Endpoint, JitterSource, PushChannel,
    ThreadRngJitter,
};
use crate::ext::ErrorChainExt;
use crate::session::Control;
use crate::tree::TreeEngine;
use crate::view::{Frame, Header, Palette, Screen, ScreenError, TreeView};

/// Minimum time between two frames while events stream in.
const FRAME_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

enum Step {
    Channel(ChannelEvent),
    Tick,
    Control(Option<Control>),
}

/// Drives one viewer: performs the actions the [`ConnectionManager`] asks
/// for, feeds it channel events, timers and user controls, and redraws the
/// screen.
///
/// Everything runs on the current task; at most one channel and one
/// countdown timer are alive at any time.
pub struct Session<J: JitterSource = ThreadRngJitter, W: Write = io::Stdout> {
    endpoint: Endpoint,
    header: Header,
    palette: Palette,
    manager: ConnectionManager<J>,
    tree: TreeEngine<TreeView>,
    screen: Screen<W>,
    controls: UnboundedReceiver<Control>,
    connect_timeout: Duration,
    last_draw: Option<Instant>,
    pending_draw: Option<Instant>,
}

impl<J: JitterSource, W: Write> Session<J, W> {
    pub fn new(
        endpoint: Endpoint,
        header: Header,
        palette: Palette,
        manager: ConnectionManager<J>,
        view: TreeView,
        screen: Screen<W>,
        controls: UnboundedReceiver<Control>,
    ) -> Self {
        Self {
            endpoint,
            header,
            palette,
            manager,
            tree: TreeEngine::with_observer(view),
            screen,
            controls,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            last_draw: None,
            pending_draw: None,
        }
    }

    /// Bounds how long opening the channel, handshake included, may take.
    pub fn with_connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = limit;
        self
    }

    pub fn tree(&self) -> &TreeEngine<TreeView> {
        &self.tree
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn into_screen(self) -> Screen<W> {
        self.screen
    }

    /// Runs until the user quits, or until controls end while the
    /// endpoint is unsupported.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        info!("Watching {}", self.endpoint);
        let mut action = self.manager.start();
        loop {
            self.draw(Instant::now())?;
            action = match action {
                Action::Connect => self.connect().await?,
                Action::Wait(delay) => self.wait(delay).await?,
                Action::Idle if self.manager.state() == ConnectionState::Stopped => {
                    info!("Session finished");
                    return Ok(());
                }
                Action::Idle => self.idle().await,
            };
        }
    }

    async fn connect(&mut self) -> Result<Action, SessionError> {
        let opened = {
            let open = PushChannel::open_within(&self.endpoint, self.connect_timeout).fuse();
            let mut open = pin!(open);
            loop {
                select_biased! {
                    result = open => break result,
                    control = self.controls.next() => {
                        if control == Some(Control::Quit) {
                            return Ok(self.manager.stop());
                        }
                    }
                }
            }
        };

        let mut channel = match opened {
            Ok(channel) => channel,
            Err(err) => return Ok(self.manager.on_error(Instant::now(), &err.chain_display())),
        };
        self.manager.on_open(Instant::now(), &mut self.tree);
        self.draw(Instant::now())?;

        loop {
            let wake = self.next_wake(Instant::now());
            let step = {
                let recv = channel.recv().fuse();
                let mut recv = pin!(recv);
                let timer = sleep_until(wake).fuse();
                let mut timer = pin!(timer);
                select_biased! {
                    event = recv => Step::Channel(event),
                    control = self.controls.next() => Step::Control(control),
                    _ = timer => Step::Tick,
                }
            };

            let now = Instant::now();
            match step {
                Step::Channel(ChannelEvent::Message(payload)) => {
                    self.tree.observer_mut().advance(now);
                    self.manager.on_message(&payload, &mut self.tree);
                    self.refresh(now)?;
                }
                Step::Channel(ChannelEvent::Closed) => return Ok(self.manager.on_closed(now)),
                Step::Channel(ChannelEvent::Failed(reason)) => {
                    return Ok(self.manager.on_error(now, &reason));
                }
                Step::Control(Some(Control::Quit)) => return Ok(self.manager.stop()),
                Step::Control(_) => {}
                Step::Tick => self.draw(now)?,
            }
        }
    }

    async fn wait(&mut self, delay: Duration) -> Result<Action, SessionError> {
        let countdown_at = Instant::now() + delay;
        loop {
            let wake = earliest(Some(countdown_at), self.next_wake(Instant::now()));
            let step = {
                let timer = sleep_until(wake).fuse();
                let mut timer = pin!(timer);
                select_biased! {
                    control = self.controls.next() => Step::Control(control),
                    _ = timer => Step::Tick,
                }
            };

            let now = Instant::now();
            match step {
                Step::Tick if now >= countdown_at => return Ok(self.manager.countdown(now)),
                Step::Tick | Step::Channel(_) => self.draw(now)?,
                Step::Control(Some(Control::RetryNow)) => return Ok(self.manager.retry_now(now)),
                Step::Control(Some(Control::Quit)) => return Ok(self.manager.stop()),
                Step::Control(None) => debug!("Controls closed, countdown continues"),
            }
        }
    }

    /// Nothing to do but wait for the user to leave.
    async fn idle(&mut self) -> Action {
        loop {
            match self.controls.next().await {
                Some(Control::RetryNow) => debug!("Retry ignored in state {}", self.manager.state()),
                Some(Control::Quit) | None => return self.manager.stop(),
            }
        }
    }

    fn next_wake(&self, now: Instant) -> Option<Instant> {
        [
            self.tree.observer().next_expiry(),
            self.manager.next_status_change(now),
            self.pending_draw,
        ]
        .into_iter()
        .fold(None, earliest)
    }

    /// Draws if the tree changed, at most once per [`FRAME_INTERVAL`].
    fn refresh(&mut self, now: Instant) -> Result<(), SessionError> {
        if !self.tree.observer().is_dirty() {
            return Ok(());
        }
        match self.last_draw {
            Some(last) if now < last + FRAME_INTERVAL => {
                self.pending_draw = Some(last + FRAME_INTERVAL);
                Ok(())
            }
            _ => self.draw(now),
        }
    }

    fn draw(&mut self, now: Instant) -> Result<(), SessionError> {
        self.tree.observer_mut().advance(now);
        let status = self.manager.status(now);
        let frame = Frame {
            header: &self.header,
            status: &status,
            tree: &self.tree,
            palette: self.palette,
            now,
        }
        .render();
        self.screen.draw(frame).context(ScreenSnafu)?;

        self.tree.observer_mut().mark_drawn();
        self.last_draw = Some(now);
        self.pending_draw = None;
        Ok(())
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => compio::time::sleep_until(deadline).await,
        None => futures::future::pending::<()>().await,
    }
}

#[derive(Debug, Snafu)]
pub enum SessionError {
    #[snafu(display("Failed to draw the viewer"))]
    ScreenError { source: ScreenError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::BackoffClock;
    use crate::tree::TreeNode;
    use async_tungstenite::WebSocketStream;
    use async_tungstenite::tungstenite::Message;
    use compio::io::compat::AsyncStream;
    use compio::net::{TcpListener, TcpStream};
    use futures::SinkExt;
    use futures_channel::{mpsc, oneshot};
    use std::pin::Pin;

    const WERE_BACK: Duration = Duration::from_secs(8);

    fn header() -> Header {
        Header {
            name: "local".to_string(),
            path: "/".to_string(),
        }
    }

    fn session(
        endpoint: Endpoint,
        controls: UnboundedReceiver<Control>,
    ) -> Session<impl JitterSource, Vec<u8>> {
        let manager = ConnectionManager::new(
            endpoint.capability(),
            BackoffClock::new(|| 1.0),
            WERE_BACK,
        );
        Session::new(
            endpoint,
            header(),
            Palette::plain(),
            manager,
            TreeView::default(),
            Screen::new(Vec::new()),
            controls,
        )
    }

    #[test]
    fn earliest_ignores_missing_instants() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        assert_eq!(earliest(None, None), None);
        assert_eq!(earliest(Some(later), None), Some(later));
        assert_eq!(earliest(None, Some(now)), Some(now));
        assert_eq!(earliest(Some(later), Some(now)), Some(now));
    }

    #[compio::test]
    async fn unsupported_endpoint_waits_for_quit_without_connecting() {
        let endpoint: Endpoint = "wss://127.0.0.1:1/$events/".parse().unwrap();
        let (sender, receiver) = mpsc::unbounded();
        sender.unbounded_send(Control::RetryNow).unwrap();
        sender.unbounded_send(Control::Quit).unwrap();

        let mut session = session(endpoint, receiver);
        session.run().await.unwrap();

        assert_eq!(session.state(), ConnectionState::Stopped);
        let screen = String::from_utf8(session.into_screen().into_inner()).unwrap();
        assert!(screen.contains("[this build does not provide secure websockets (wss)]"));
    }

    #[compio::test]
    async fn quit_while_retrying_ends_the_session() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = Endpoint::new(false, &format!("127.0.0.1:{port}"), "/$events", "/").unwrap();
        let (sender, receiver) = mpsc::unbounded();
        let mut session = session(endpoint, receiver);

        compio::runtime::spawn(async move {
            compio::time::sleep(Duration::from_millis(300)).await;
            let _ = sender.unbounded_send(Control::Quit);
        })
        .detach();
        session.run().await.unwrap();

        assert_eq!(session.state(), ConnectionState::Stopped);
        let screen = String::from_utf8(session.into_screen().into_inner()).unwrap();
        assert!(screen.contains("[error Failed to connect to 127.0.0.1"));
        assert!(screen.contains("retrying in 5s  [Enter: try now]"));
    }

    #[compio::test]
    async fn stalled_handshake_counts_as_a_failed_attempt() {
        // Connections land in the backlog and never get an upgrade response.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let endpoint = Endpoint::new(false, &address.to_string(), "/$events", "/").unwrap();
        let (sender, receiver) = mpsc::unbounded();
        let mut session =
            session(endpoint, receiver).with_connect_timeout(Duration::from_millis(200));

        compio::runtime::spawn(async move {
            compio::time::sleep(Duration::from_millis(800)).await;
            let _ = sender.unbounded_send(Control::Quit);
        })
        .detach();
        session.run().await.unwrap();
        drop(listener);

        let screen = String::from_utf8(session.into_screen().into_inner()).unwrap();
        assert!(screen.contains("[error Timed out after 200ms connecting to ws://"));
        assert!(screen.contains("retrying in 5s  [Enter: try now]"));
    }

    type ServerChannel = WebSocketStream<Pin<Box<AsyncStream<TcpStream>>>>;

    async fn accept_channel(listener: &TcpListener) -> ServerChannel {
        let (tcp, _) = listener.accept().await.unwrap();
        async_tungstenite::accept_async(Box::pin(AsyncStream::new(tcp)))
            .await
            .unwrap()
    }

    async fn send_all(channel: &mut ServerChannel, payloads: &[&str]) {
        for payload in payloads {
            channel.send(Message::Text((*payload).into())).await.unwrap();
        }
    }

    /// Closes from the server side and waits until the viewer dropped its end.
    async fn close_and_drain(mut channel: ServerChannel) {
        channel.close(None).await.unwrap();
        while let Some(Ok(_)) = channel.next().await {}
    }

    fn last_frame(screen: &str) -> &str {
        screen.rsplit("\x1b[2J").next().unwrap_or_default()
    }

    #[compio::test]
    async fn reconnects_and_rebuilds_the_tree_from_scratch() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let endpoint = Endpoint::new(false, &address.to_string(), "/$events", "/").unwrap();
        let (sender, receiver) = mpsc::unbounded();
        let (retry_tx, retry_rx) = oneshot::channel::<Duration>();

        compio::runtime::spawn(async move {
            let mut first = accept_channel(&listener).await;
            send_all(
                &mut first,
                &[
                    r#"{"Path":"/one/b","Rev":2,"Body":"yo"}"#,
                    "not json",
                    r#"{"Path":"/one/a","Rev":1,"Body":"hi"}"#,
                    r#"{"Path":"/","Rev":1,"Body":"no basename"}"#,
                ],
            )
            .await;
            close_and_drain(first).await;

            // Closing reconnects after a zero delay, into a fresh tree.
            let mut second = accept_channel(&listener).await;
            send_all(
                &mut second,
                &[
                    r#"{"Path":"/two/c","Rev":3,"Body":"see"}"#,
                    r#"{"Path":"/two/d","Rev":4,"Body":"dee"}"#,
                ],
            )
            .await;
            close_and_drain(second).await;

            // The next handshake fails, leaving the viewer on a 5s countdown.
            let (tcp, _) = listener.accept().await.unwrap();
            drop(tcp);
            compio::time::sleep(Duration::from_millis(300)).await;
            let asked = Instant::now();
            sender.unbounded_send(Control::RetryNow).unwrap();
            let mut third = accept_channel(&listener).await;
            retry_tx.send(asked.elapsed()).unwrap();

            send_all(&mut third, &[r#"{"Path":"/two/c","Rev":5,"Body":"again"}"#]).await;
            compio::time::sleep(Duration::from_millis(200)).await;
            sender.unbounded_send(Control::Quit).unwrap();
            while let Some(Ok(_)) = third.next().await {}
        })
        .detach();

        let mut session = session(endpoint, receiver);
        session.run().await.unwrap();
        let retry_latency = retry_rx.await.unwrap();

        assert!(retry_latency < Duration::from_secs(2), "{retry_latency:?}");
        assert_eq!(session.state(), ConnectionState::Stopped);

        let tree = session.tree();
        assert_eq!(tree.entry_count(), 1);
        assert_eq!(tree.directory_count(), 1);
        assert!(tree.find("/one/").is_none());
        assert!(tree.find("/two/d").is_none());
        assert!(matches!(tree.find("/two/c"), Some(TreeNode::Entry(_, entry)) if entry.body() == "again"));

        let screen = String::from_utf8(session.into_screen().into_inner()).unwrap();
        assert!(screen.contains("  one/\n    a (1) = hi\n    b (2) = yo"));
        assert!(screen.contains("  two/\n    c (3) = see\n    d (4) = dee"));
        assert!(screen.contains("[closed]"));
        assert!(screen.contains("retrying in 5s  [Enter: try now]"));
        assert!(screen.contains("...and, we're back!"));

        let last = last_frame(&screen);
        assert!(last.contains("    c (5) = again"), "{last}");
        assert!(!last.contains("one/") && !last.contains("d (4)"), "{last}");
    }
}
