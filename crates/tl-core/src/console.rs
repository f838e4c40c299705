//! Single dispatch point for local (non-network) chat commands.
//!
//! The console owns the message log and the proximity estimator; callers
//! send [`Command`]s and render from the returned [`Outcome`] instead of
//! touching either collection directly.

use rand::Rng;

use crate::error::Result;
use crate::message::{Message, MessageLog};
use crate::proximity::{ProximityEstimator, ProximitySnapshot};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Send(String),
    Sos,
    Tick,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Appended(Message),
    Proximity(ProximitySnapshot),
}

pub struct Console {
    log: MessageLog,
    proximity: ProximityEstimator,
}

impl Console {
    pub fn new(log: MessageLog, proximity: ProximityEstimator) -> Self {
        Self { log, proximity }
    }

    /// Apply one command. A rejected send leaves all state untouched.
    pub fn dispatch(&mut self, command: Command, rng: &mut impl Rng) -> Result<Outcome> {
        match command {
            Command::Send(text) => self.log.append(&text).map(Outcome::Appended),
            Command::Sos => Ok(Outcome::Appended(self.log.append_sos())),
            Command::Tick => Ok(Outcome::Proximity(self.proximity.tick(rng))),
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn proximity(&self) -> ProximitySnapshot {
        self.proximity.snapshot()
    }

    /// Hand the owned state back, e.g. to move the estimator into a timer task.
    pub fn into_parts(self) -> (MessageLog, ProximityEstimator) {
        (self.log, self.proximity)
    }
}
