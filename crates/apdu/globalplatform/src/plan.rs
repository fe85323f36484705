//! Card management run plan
//!
//! A [`Plan`] lists what to do on each card: deletes (or a format), a load,
//! installs and a final listing. Steps run in that order. A card rejection
//! fails only its step; authentication and transport failures end the work on
//! that card.

use gpman_apdu_core::CardTransport;
use tracing::{debug, info, info_span, warn};

use crate::cap::CapFile;
use crate::config::SessionConfig;
use crate::load::LoadReport;
use crate::registry::{DeleteReport, Registry};
use crate::session::Session;
use crate::{Aid, Error, Result};

/// One INSTALL [for install and make selectable] request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallEntry {
    /// Executable load file; defaults to the loaded CAP file's package
    pub package: Option<Aid>,
    /// Applet class to instantiate; `None` installs every applet of the loaded CAP file
    pub applet: Option<Aid>,
    /// Privilege byte
    pub privileges: u8,
    /// Application parameters, wrapped in `C9` when needed
    pub params: Vec<u8>,
}

/// What to do on every card
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Objects to delete
    pub deletes: Vec<Aid>,
    /// Delete dependents together with each object
    pub delete_dependents: bool,
    /// Delete every package; ignored when `deletes` is not empty
    pub format: bool,
    /// CAP file to load
    pub load: Option<CapFile>,
    /// Applets to install after loading
    pub installs: Vec<InstallEntry>,
    /// Read the registry at the end
    pub list: bool,
}

impl Plan {
    /// An empty plan: authenticate only
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to delete
    pub fn delete(mut self, aid: Aid) -> Self {
        self.deletes.push(aid);
        self
    }

    /// Delete dependents as well
    pub const fn with_dependents(mut self, include: bool) -> Self {
        self.delete_dependents = include;
        self
    }

    /// Delete every package on the card
    pub const fn format(mut self) -> Self {
        self.format = true;
        self
    }

    /// Load a CAP file
    pub fn load(mut self, cap: CapFile) -> Self {
        self.load = Some(cap);
        self
    }

    /// Add an install request
    pub fn install(mut self, entry: InstallEntry) -> Self {
        self.installs.push(entry);
        self
    }

    /// List the registry at the end
    pub const fn list(mut self) -> Self {
        self.list = true;
        self
    }

    /// Run the plan on one session
    pub fn execute<T: CardTransport>(&self, session: &mut Session<T>) -> CardOutcome {
        let mut outcome = CardOutcome::default();

        if let Err(error) = session.open_secure_channel() {
            // No management command can follow a failed handshake
            warn!(%error, "Could not open secure channel");
            outcome.steps.push(StepOutcome::Failed {
                step: Step::Authenticate,
                error,
            });
            outcome.aborted = true;
            return outcome;
        }
        outcome.steps.push(StepOutcome::Done(Step::Authenticate));

        match session.card_data() {
            Ok(data) => debug!(card_data = %hex::encode_upper(&data), "Card data"),
            Err(error) if error.is_fatal() => {
                outcome.record(Step::CardData, Err(error));
                return outcome;
            }
            Err(error) => debug!(%error, "Card data not available"),
        }

        if !self.deletes.is_empty() {
            let registry = match session.registry() {
                Ok(registry) => Some(registry),
                Err(error) => {
                    if !outcome.record(Step::ReadRegistry, Err(error)) {
                        return outcome;
                    }
                    None
                }
            };
            for aid in &self.deletes {
                let step = Step::Delete(aid.clone());
                let absent = registry.as_ref().is_some_and(|registry| !registry.contains(aid));
                match session.delete(aid, self.delete_dependents) {
                    Err(error) if !error.is_fatal() && absent => {
                        info!(%aid, "Could not delete AID (not present on card)");
                        outcome.steps.push(StepOutcome::Skipped {
                            step,
                            reason: "not present on card",
                        });
                    }
                    result => {
                        if !outcome.record(step, result.map(StepOutcome::Deleted)) {
                            return outcome;
                        }
                    }
                }
            }
        } else if self.format
            && !outcome.record(Step::Format, session.format().map(StepOutcome::Formatted))
        {
            return outcome;
        }

        if let Some(cap) = &self.load {
            let step = Step::Load(cap.package_aid().clone());
            if !outcome.record(step, session.load(cap).map(StepOutcome::Loaded)) {
                return outcome;
            }
        }

        for entry in &self.installs {
            let step = Step::Install(entry.applet.clone());
            let result = self.run_install(session, entry);
            if !outcome.record(step, result.map(StepOutcome::Installed)) {
                return outcome;
            }
        }

        if self.list {
            outcome.record(Step::List, session.registry().map(StepOutcome::Listed));
        }
        outcome
    }

    fn run_install<T: CardTransport>(
        &self,
        session: &mut Session<T>,
        entry: &InstallEntry,
    ) -> Result<Vec<Aid>> {
        let Some(applet) = &entry.applet else {
            let cap = self
                .load
                .as_ref()
                .ok_or(Error::InvalidConfig("installing all applets needs a CAP file"))?;
            return session.install_applets(cap, entry.privileges, &entry.params);
        };

        let package = entry
            .package
            .clone()
            .or_else(|| self.load.as_ref().map(|cap| cap.package_aid().clone()))
            .ok_or(Error::InvalidConfig("install needs a package AID"))?;
        session.install_and_make_selectable(&package, applet, None, entry.privileges, &entry.params)?;
        Ok(vec![applet.clone()])
    }
}

/// A step of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// SELECT and SCP02 handshake
    Authenticate,
    /// GET DATA for card recognition data
    CardData,
    /// Registry read before deleting
    ReadRegistry,
    /// Delete one object
    Delete(Aid),
    /// Delete every package
    Format,
    /// Load a package
    Load(Aid),
    /// Install one applet, or all applets of the loaded package
    Install(Option<Aid>),
    /// Final registry listing
    List,
}

/// What became of one step
#[derive(Debug)]
pub enum StepOutcome {
    /// Step without a report completed
    Done(Step),
    /// Object deleted
    Deleted(DeleteReport),
    /// Packages deleted by a format
    Formatted(Vec<DeleteReport>),
    /// Package loaded
    Loaded(LoadReport),
    /// Applets installed
    Installed(Vec<Aid>),
    /// Registry listed
    Listed(Registry),
    /// Step not attempted or not applicable
    Skipped {
        /// The step
        step: Step,
        /// Why it was skipped
        reason: &'static str,
    },
    /// Step failed
    Failed {
        /// The step
        step: Step,
        /// The failure
        error: Error,
    },
}

/// Everything that happened on one card
#[derive(Debug, Default)]
pub struct CardOutcome {
    /// Outcomes in execution order
    pub steps: Vec<StepOutcome>,
    /// A fatal error ended the work on this card early
    pub aborted: bool,
}

impl CardOutcome {
    /// Record a step result; returns false when the card must be abandoned
    fn record(&mut self, step: Step, result: Result<StepOutcome>) -> bool {
        match result {
            Ok(outcome) => {
                self.steps.push(outcome);
                true
            }
            Err(error) => {
                let fatal = error.is_fatal();
                warn!(?step, %error, fatal, "Step failed");
                self.steps.push(StepOutcome::Failed { step, error });
                self.aborted |= fatal;
                !fatal
            }
        }
    }

    /// Whether every step succeeded or was skipped
    pub fn is_success(&self) -> bool {
        !self.aborted && self.failures().next().is_none()
    }

    /// Failed steps with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&Step, &Error)> {
        self.steps.iter().filter_map(|outcome| match outcome {
            StepOutcome::Failed { step, error } => Some((step, error)),
            _ => None,
        })
    }

    /// The final registry listing, if one was taken
    pub fn listing(&self) -> Option<&Registry> {
        self.steps.iter().rev().find_map(|outcome| match outcome {
            StepOutcome::Listed(registry) => Some(registry),
            _ => None,
        })
    }
}

/// Run a plan on each connection in turn, one outcome per connection
pub fn run_all<T: CardTransport>(
    connections: impl IntoIterator<Item = T>,
    config: &SessionConfig,
    plan: &Plan,
) -> Vec<CardOutcome> {
    connections
        .into_iter()
        .enumerate()
        .map(|(index, transport)| {
            let span = info_span!("card", index);
            let _guard = span.enter();

            let mut session = Session::new(transport, config.clone());
            let outcome = plan.execute(&mut session);
            session.close();
            info!(success = outcome.is_success(), steps = outcome.steps.len(), "Card done");
            outcome
        })
        .collect()
}
