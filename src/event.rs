use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::warn;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick: views drain fetch, mutation and polling results
  Tick,
}

/// Merges terminal input and a fixed-rate tick into one stream
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm's reader blocks, so it gets its own thread
    let key_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      match event::poll(Duration::from_millis(50)) {
        Ok(true) => match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
            if key_tx.send(Event::Key(key)).is_err() {
              break;
            }
          }
          Ok(_) => {}
          Err(e) => {
            warn!(%e, "terminal read failed");
            break;
          }
        },
        Ok(false) if key_tx.is_closed() => break,
        Ok(false) => {}
        Err(e) => {
          warn!(%e, "terminal poll failed");
          break;
        }
      }
    });

    tokio::spawn(async move {
      let mut ticks = time::interval(tick_rate);
      ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
      loop {
        ticks.tick().await;
        if tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
