//! Series splicing.
//!
//! Turns a roll schedule into an unadjusted continuous bar sequence plus the
//! roll events observed at each switch of the active contract.

use chrono::NaiveDate;
use contfut_core::{ContinuousBar, Error, PriceReference, RawContractBar, RollEvent, Tenor};
use contfut_ingestion::ContractBook;
use contfut_roll::RollSchedule;
use tracing::debug;

/// Unadjusted continuous bars for one tenor.
#[derive(Debug)]
pub struct SplicedSeries {
    pub tenor: Tenor,
    pub bars: Vec<ContinuousBar>,
    /// Trading date of each bar, parallel to `bars`.
    pub dates: Vec<NaiveDate>,
    pub roll_events: Vec<RollEvent>,
    /// Set when splicing stopped early; `bars` holds the prefix built so far.
    pub error: Option<Error>,
}

impl SplicedSeries {
    /// Bars and roll events strictly before `date`, without the error.
    pub fn truncated_before(&self, date: NaiveDate) -> SplicedSeries {
        let end = self.dates.partition_point(|&d| d < date);
        SplicedSeries {
            tenor: self.tenor,
            bars: self.bars[..end].to_vec(),
            dates: self.dates[..end].to_vec(),
            roll_events: self
                .roll_events
                .iter()
                .filter(|e| e.date < date)
                .cloned()
                .collect(),
            error: None,
        }
    }
}

/// Splices raw contract bars along a schedule.
pub struct SeriesSplicer<'a> {
    book: &'a ContractBook,
    reference: PriceReference,
}

impl<'a> SeriesSplicer<'a> {
    /// Create a splicer reading from a contract book.
    pub fn new(book: &'a ContractBook, reference: PriceReference) -> Self {
        Self { book, reference }
    }

    fn reference_price(&self, bar: &RawContractBar) -> f64 {
        match self.reference {
            PriceReference::Close => bar.close,
            PriceReference::Open => bar.open,
        }
    }

    /// Emit every bar of the active contract on each scheduled date.
    pub fn splice(&self, schedule: &RollSchedule) -> SplicedSeries {
        let mut out = SplicedSeries {
            tenor: schedule.tenor,
            bars: Vec::new(),
            dates: Vec::new(),
            roll_events: Vec::new(),
            error: None,
        };
        // (symbol, position, last close) of the contract emitted on the previous date.
        let mut previous: Option<(&str, usize, f64)> = None;

        for entry in &schedule.entries {
            let day = self
                .book
                .at(entry.position)
                .and_then(|h| h.bars_on(entry.date))
                .filter(|bars| !bars.is_empty());
            let Some(day) = day else {
                out.error = Some(Error::missing_data(entry.symbol.clone(), entry.date));
                return out;
            };

            if let Some((outgoing, position, previous_close)) = previous {
                if position != entry.position {
                    let incoming_price = self.reference_price(&day[0]);
                    // Both prices are read on the roll date; the previous close is a fallback.
                    let outgoing_close = self
                        .book
                        .at(position)
                        .and_then(|h| h.bars_on(entry.date))
                        .and_then(|bars| bars.first())
                        .map_or(previous_close, |bar| self.reference_price(bar));
                    let event = RollEvent::new(
                        entry.date,
                        schedule.tenor,
                        outgoing,
                        entry.symbol.clone(),
                        outgoing_close,
                        incoming_price,
                        self.reference,
                    );
                    debug!(
                        tenor = schedule.tenor,
                        date = %event.date,
                        outgoing = %event.outgoing,
                        incoming = %event.incoming,
                        outgoing_close,
                        incoming_price,
                        "roll event"
                    );
                    out.roll_events.push(event);
                }
            }

            for bar in day {
                out.bars.push(ContinuousBar::from_raw(bar, schedule.tenor));
                out.dates.push(entry.date);
            }
            let last_close = day.last().map_or(f64::NAN, |b| b.close);
            previous = Some((entry.symbol.as_str(), entry.position, last_close));
        }

        out.error = schedule.halt_error();
        out
    }
}
