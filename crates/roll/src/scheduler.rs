//! Roll scheduling.
//!
//! Walks the trading calendar once for the front month, deciding the active
//! contract on every date. Deeper tenors reuse the front-month roll dates and
//! hold the contract N positions further out in the candidate list.

use chrono::NaiveDate;
use contfut_core::{Error, GapReason, RollGap, Tenor};
use contfut_ingestion::{ContractBook, ContractHistory};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::strategy::RollStrategy;
use crate::trailing::TrailingWindow;

/// Per-tenor roll state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollState {
    /// Holding a contract and evaluating the roll criterion each date.
    SelectingContract,
    /// A roll is due on the current date.
    Rolling,
    /// No candidates remain after the held contract expired.
    Exhausted,
    /// A roll could not be executed on or after expiration.
    Failed,
}

/// A switch of the active contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollPoint {
    /// First date the incoming contract is active.
    pub date: NaiveDate,
    pub outgoing: usize,
    pub incoming: usize,
    pub outgoing_symbol: String,
    pub incoming_symbol: String,
}

/// Active contract on one trading date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub date: NaiveDate,
    /// Position in the candidate list.
    pub position: usize,
    pub symbol: String,
}

/// Why a schedule stopped before the end of the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleHalt {
    /// The held contract expired and no later candidate exists.
    Exhausted { date: NaiveDate },
    /// The next contract had no bar when the held contract reached expiration.
    NoNextContract { date: NaiveDate, symbol: String },
    /// The initial contract never traded before it was due to roll.
    MissingData { date: NaiveDate, symbol: String },
}

/// Date-ordered active contract assignment for one tenor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollSchedule {
    pub tenor: Tenor,
    pub entries: Vec<ScheduleEntry>,
    pub rolls: Vec<RollPoint>,
    pub gaps: Vec<RollGap>,
    pub halt: Option<ScheduleHalt>,
}

impl RollSchedule {
    /// Active contract on a date, if scheduled.
    pub fn active_on(&self, date: NaiveDate) -> Option<&ScheduleEntry> {
        self.entries
            .binary_search_by(|e| e.date.cmp(&date))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// State the tenor ended in.
    pub fn final_state(&self) -> RollState {
        match self.halt {
            None => RollState::SelectingContract,
            Some(ScheduleHalt::Exhausted { .. }) => RollState::Exhausted,
            Some(ScheduleHalt::NoNextContract { .. } | ScheduleHalt::MissingData { .. }) => RollState::Failed,
        }
    }

    /// Error carried by a failed schedule. Exhaustion is not an error.
    pub fn halt_error(&self) -> Option<Error> {
        match &self.halt {
            Some(ScheduleHalt::NoNextContract { date, symbol }) => {
                Some(Error::no_next_contract(symbol.clone(), *date))
            }
            Some(ScheduleHalt::MissingData { date, symbol }) => Some(Error::missing_data(symbol.clone(), *date)),
            _ => None,
        }
    }

    /// Derive the schedule of a deeper tenor from this front-month schedule.
    ///
    /// Every position is shifted by `tenor`; the derived schedule ends as
    /// `Exhausted` on the first date the shifted position runs off the book.
    pub fn for_tenor(&self, tenor: Tenor, book: &ContractBook) -> RollSchedule {
        if tenor == 0 {
            return self.clone();
        }
        let symbol_at = |position: usize| book.at(position).map(|h| h.symbol.clone());

        let mut entries = Vec::with_capacity(self.entries.len());
        let mut halt = None;
        for entry in &self.entries {
            match symbol_at(entry.position + tenor) {
                Some(symbol) => entries.push(ScheduleEntry {
                    date: entry.date,
                    position: entry.position + tenor,
                    symbol,
                }),
                None => {
                    halt = Some(ScheduleHalt::Exhausted { date: entry.date });
                    break;
                }
            }
        }
        let end = halt.as_ref().map(|h| match h {
            ScheduleHalt::Exhausted { date }
            | ScheduleHalt::NoNextContract { date, .. }
            | ScheduleHalt::MissingData { date, .. } => *date,
        });
        let before_end = |date: NaiveDate| end.map_or(true, |end| date < end);

        let rolls = self
            .rolls
            .iter()
            .filter(|r| before_end(r.date))
            .filter_map(|r| {
                Some(RollPoint {
                    date: r.date,
                    outgoing: r.outgoing + tenor,
                    incoming: r.incoming + tenor,
                    outgoing_symbol: symbol_at(r.outgoing + tenor)?,
                    incoming_symbol: symbol_at(r.incoming + tenor)?,
                })
            })
            .collect();

        let gaps = self
            .gaps
            .iter()
            .filter(|g| before_end(g.date))
            .filter_map(|g| {
                let held = self.active_on(g.date)?.position + tenor;
                let reason = match symbol_at(held + 1) {
                    Some(next) if matches!(g.reason, GapReason::NextNotTrading { .. }) => {
                        GapReason::NextNotTrading { next }
                    }
                    _ => GapReason::NoCandidate,
                };
                Some(RollGap {
                    date: g.date,
                    held: symbol_at(held)?,
                    reason,
                })
            })
            .collect();

        if halt.is_none() {
            halt = match &self.halt {
                Some(ScheduleHalt::Exhausted { date }) => Some(ScheduleHalt::Exhausted { date: *date }),
                Some(ScheduleHalt::NoNextContract { date, symbol }) => {
                    let position = self
                        .entries
                        .last()
                        .map(|e| e.position + tenor)
                        .and_then(symbol_at);
                    Some(ScheduleHalt::NoNextContract {
                        date: *date,
                        symbol: position.unwrap_or_else(|| symbol.clone()),
                    })
                }
                // Deeper tenors take their roll dates from the front month, so its gap stops them too.
                Some(missing @ ScheduleHalt::MissingData { .. }) => Some(missing.clone()),
                None => None,
            };
        }

        RollSchedule {
            tenor,
            entries,
            rolls,
            gaps,
            halt,
        }
    }
}

/// Front-month roll scheduler over a contract book.
pub struct RollScheduler<'a> {
    book: &'a ContractBook,
    strategy: RollStrategy,
}

impl<'a> RollScheduler<'a> {
    /// Create a scheduler; candidates are the book's contracts in expiration order.
    pub fn new(book: &'a ContractBook, strategy: RollStrategy) -> Self {
        Self { book, strategy }
    }

    /// Is a roll due for `current` on `date`?
    fn due(&self, position: usize, date: NaiveDate, window: &TrailingWindow) -> bool {
        let Some(current) = self.book.at(position) else {
            return false;
        };
        date > current.expiration
            || self
                .strategy
                .should_roll(current, self.book.at(position + 1), date, window)
    }

    /// Pick the initial contract on the first date, skipping candidates already due.
    fn initial_position(&self, date: NaiveDate, window: &TrailingWindow) -> usize {
        let mut position = 0;
        while position + 1 < self.book.len() && self.due(position, date, window) {
            position += 1;
        }
        position
    }

    /// Schedule the front month over a sorted trading calendar.
    pub fn schedule(&self, calendar: &[NaiveDate]) -> RollSchedule {
        let mut schedule = RollSchedule {
            tenor: 0,
            entries: Vec::with_capacity(calendar.len()),
            rolls: Vec::new(),
            gaps: Vec::new(),
            halt: None,
        };
        let mut state = RollState::SelectingContract;
        let mut window = TrailingWindow::new(self.strategy.window());
        let mut position: Option<usize> = None;
        // First calendar date and the contract chosen on it, kept until it trades.
        let mut awaiting: Option<(NaiveDate, usize)> = None;

        for &date in calendar {
            window.push(date);

            let Some(held) = position else {
                let initial = self.initial_position(date, &window);
                let Some(current) = self.book.at(initial) else {
                    break;
                };
                if date > current.expiration {
                    debug!(%date, symbol = %current.symbol, "no live candidate on first date");
                    transition(&mut state, RollState::Exhausted, date);
                    schedule.halt = Some(ScheduleHalt::Exhausted { date });
                    break;
                }
                let (first_date, chosen) = *awaiting.get_or_insert((date, initial));
                let never_traded = if chosen != initial {
                    self.book.at(chosen)
                } else if current.first_date().is_none() {
                    Some(current)
                } else {
                    None
                };
                if let Some(missing) = never_traded {
                    warn!(date = %first_date, symbol = %missing.symbol, "initial contract has no bars before its roll");
                    transition(&mut state, RollState::Failed, date);
                    schedule.halt = Some(ScheduleHalt::MissingData {
                        date: first_date,
                        symbol: missing.symbol.clone(),
                    });
                    break;
                }
                if current.first_date().is_some_and(|first| date < first) {
                    debug!(%date, symbol = %current.symbol, "initial contract not trading yet");
                    continue;
                }
                debug!(%date, symbol = %current.symbol, "initial contract selected");
                position = Some(initial);
                push_entry(&mut schedule, date, initial, current);
                continue;
            };

            let Some(current) = self.book.at(held) else {
                break;
            };
            if !self.due(held, date, &window) {
                push_entry(&mut schedule, date, held, current);
                continue;
            }

            transition(&mut state, RollState::Rolling, date);
            match self.book.at(held + 1) {
                None if date > current.expiration => {
                    transition(&mut state, RollState::Exhausted, date);
                    schedule.halt = Some(ScheduleHalt::Exhausted { date });
                    break;
                }
                None => {
                    warn!(%date, held = %current.symbol, "roll due but no later candidate");
                    schedule.gaps.push(RollGap {
                        date,
                        held: current.symbol.clone(),
                        reason: GapReason::NoCandidate,
                    });
                    transition(&mut state, RollState::SelectingContract, date);
                    push_entry(&mut schedule, date, held, current);
                }
                Some(next) if next.has_bars(date) => {
                    debug!(%date, from = %current.symbol, to = %next.symbol, "roll");
                    schedule.rolls.push(RollPoint {
                        date,
                        outgoing: held,
                        incoming: held + 1,
                        outgoing_symbol: current.symbol.clone(),
                        incoming_symbol: next.symbol.clone(),
                    });
                    position = Some(held + 1);
                    transition(&mut state, RollState::SelectingContract, date);
                    push_entry(&mut schedule, date, held + 1, next);
                }
                Some(next) if date >= current.expiration => {
                    warn!(%date, held = %current.symbol, next = %next.symbol, "next contract not trading at expiration");
                    transition(&mut state, RollState::Failed, date);
                    schedule.halt = Some(ScheduleHalt::NoNextContract {
                        date,
                        symbol: current.symbol.clone(),
                    });
                    break;
                }
                Some(next) => {
                    warn!(%date, held = %current.symbol, next = %next.symbol, "roll deferred, next contract not trading");
                    schedule.gaps.push(RollGap {
                        date,
                        held: current.symbol.clone(),
                        reason: GapReason::NextNotTrading {
                            next: next.symbol.clone(),
                        },
                    });
                    transition(&mut state, RollState::SelectingContract, date);
                    push_entry(&mut schedule, date, held, current);
                }
            }
        }

        if let (None, None, Some((date, chosen))) = (&schedule.halt, position, awaiting) {
            if let Some(missing) = self.book.at(chosen) {
                warn!(%date, symbol = %missing.symbol, "initial contract has no bars in range");
                transition(&mut state, RollState::Failed, date);
                schedule.halt = Some(ScheduleHalt::MissingData {
                    date,
                    symbol: missing.symbol.clone(),
                });
            }
        }

        schedule
    }
}

fn push_entry(schedule: &mut RollSchedule, date: NaiveDate, position: usize, history: &ContractHistory) {
    schedule.entries.push(ScheduleEntry {
        date,
        position,
        symbol: history.symbol.clone(),
    });
}

fn transition(state: &mut RollState, to: RollState, date: NaiveDate) {
    if *state != to {
        debug!(%date, from = ?*state, to = ?to, "roll state transition");
        *state = to;
    }
}
