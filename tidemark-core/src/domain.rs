//! Sparsity map — the canonical interval-set value type.
//!
//! A `SparsityMap` records exactly which closed, unit-aligned intervals of
//! the timeline a processor has already ingested. The algebra here decides
//! what gets fetched (`difference` against requested domains) and what gets
//! merged back (`union` after each successful interval).
//!
//! Canonical representation, maintained by every constructor and operation:
//! intervals are sorted by start, pairwise non-overlapping, and separated by
//! more than one quantum — adjacent intervals are merged, never stored
//! separately. Two maps describing the same set always serialize to the
//! same string.

use std::fmt;
use std::ops::{Add, Sub};

use chrono::NaiveDate;

use crate::calendar::{Unit, DATE_FORMAT};
use crate::errors::DomainError;

/// One closed interval of unit-aligned dates, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    /// Build an interval, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::Malformed {
                input: format!(
                    "{}|{}",
                    start.format(DATE_FORMAT),
                    end.format(DATE_FORMAT)
                ),
                reason: "interval start after end".to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Whether `date` falls inside this closed interval.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

/// A finite set of closed intervals on the discrete timeline of one [`Unit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparsityMap {
    unit: Unit,
    intervals: Vec<DateInterval>,
}

impl SparsityMap {
    /// The empty set, serialized as `"/"`.
    pub fn empty(unit: Unit) -> Self {
        Self {
            unit,
            intervals: Vec::new(),
        }
    }

    /// A map covering exactly one interval.
    pub fn from_interval(unit: Unit, interval: DateInterval) -> Self {
        Self {
            unit,
            intervals: vec![interval],
        }
    }

    /// Parse the serialized form `"/" ( date "|" date "/" )*`.
    ///
    /// Rejects a missing leading `/`, segments without exactly one `|`,
    /// reversed intervals, and segments that do not strictly follow the
    /// previous segment's end. Adjacent segments are legal input and are
    /// merged into canonical form.
    pub fn parse(unit: Unit, input: &str) -> Result<Self, DomainError> {
        let malformed = |reason: String| DomainError::Malformed {
            input: input.to_string(),
            reason,
        };

        let Some(body) = input.strip_prefix('/') else {
            return Err(malformed("missing leading '/'".to_string()));
        };

        let mut map = Self::empty(unit);
        let mut prev_end: Option<NaiveDate> = None;
        for segment in body.split('/').filter(|s| !s.is_empty()) {
            let Some((start_text, end_text)) = segment.split_once('|') else {
                return Err(malformed(format!("segment {segment:?} lacks a '|'")));
            };
            if end_text.contains('|') {
                return Err(malformed(format!(
                    "segment {segment:?} has more than one '|'"
                )));
            }
            let start = unit.parse_date(start_text)?;
            let end = unit.parse_date(end_text)?;
            if start > end {
                return Err(malformed(format!("segment {segment:?} starts after its end")));
            }
            if let Some(prev) = prev_end {
                if start <= prev {
                    return Err(malformed(format!(
                        "segment {segment:?} does not strictly follow the previous interval"
                    )));
                }
            }
            prev_end = Some(end);
            map.absorb(DateInterval { start, end });
        }
        Ok(map)
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Intervals in ascending order.
    pub fn intervals(&self) -> &[DateInterval] {
        &self.intervals
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DateInterval> {
        self.intervals.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Whether `date` lies inside any covered interval.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.intervals.iter().any(|iv| iv.contains(date))
    }

    /// Set union. Both operands must share a unit.
    pub fn union(&self, other: &SparsityMap) -> SparsityMap {
        debug_assert_eq!(self.unit, other.unit);
        let mut result = self.clone();
        for interval in &other.intervals {
            result.absorb(*interval);
        }
        result
    }

    /// Relative complement `self − other`. Both operands must share a unit.
    pub fn difference(&self, other: &SparsityMap) -> SparsityMap {
        debug_assert_eq!(self.unit, other.unit);
        let mut result = self.clone();
        for interval in &other.intervals {
            result.remove(interval);
        }
        result
    }

    /// Fold one interval into the set: every existing interval that
    /// intersects or touches the incoming one is absorbed into it, then the
    /// widened interval is inserted in order.
    fn absorb(&mut self, mut incoming: DateInterval) {
        let unit = self.unit;
        let mut kept = Vec::with_capacity(self.intervals.len() + 1);
        for existing in self.intervals.drain(..) {
            if unit.intersects_or_adjacent(&existing, &incoming) {
                incoming.start = incoming.start.min(existing.start);
                incoming.end = incoming.end.max(existing.end);
            } else {
                kept.push(existing);
            }
        }
        kept.push(incoming);
        kept.sort_unstable_by_key(|iv| iv.start);
        self.intervals = kept;
    }

    /// Subtract one interval from the set.
    ///
    /// Per existing interval: disjoint intervals are kept; swallowed ones
    /// are dropped; a strict superset splits into two remainders; otherwise
    /// exactly one side survives. Increment/decrement keep every remainder
    /// closed on unit-aligned endpoints.
    fn remove(&mut self, sub: &DateInterval) {
        let unit = self.unit;
        let mut kept = Vec::with_capacity(self.intervals.len() + 1);
        for existing in self.intervals.drain(..) {
            if !unit.intersects(&existing, sub) {
                kept.push(existing);
            } else if sub.start <= existing.start && existing.end <= sub.end {
                // swallowed
            } else if existing.start < sub.start && sub.end < existing.end {
                kept.push(DateInterval {
                    start: existing.start,
                    end: unit.decrement(sub.start),
                });
                kept.push(DateInterval {
                    start: unit.increment(sub.end),
                    end: existing.end,
                });
            } else if sub.start <= existing.start {
                kept.push(DateInterval {
                    start: unit.increment(sub.end),
                    end: existing.end,
                });
            } else {
                kept.push(DateInterval {
                    start: existing.start,
                    end: unit.decrement(sub.start),
                });
            }
        }
        self.intervals = kept;
    }
}

impl fmt::Display for SparsityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return f.write_str("/");
        }
        for interval in &self.intervals {
            write!(f, "/{interval}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SparsityMap {
    type Item = &'a DateInterval;
    type IntoIter = std::slice::Iter<'a, DateInterval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

impl Add for &SparsityMap {
    type Output = SparsityMap;

    fn add(self, rhs: &SparsityMap) -> SparsityMap {
        self.union(rhs)
    }
}

impl Sub for &SparsityMap {
    type Output = SparsityMap;

    fn sub(self, rhs: &SparsityMap) -> SparsityMap {
        self.difference(rhs)
    }
}
