use std::collections::VecDeque;

use emu_core::{Observable, Value};

use crate::{Edge, Levels, Line, OutputChange, ParticipantId};

/// Latch changes applied by one [`SerialBus::set_output`] call before the
/// bus gives up on reaching a fixed point.
pub const MAX_SETTLE_STEPS: usize = 64;

/// Receives edge notifications from the bus.
///
/// Implemented by whatever owns the participants (a machine, a test
/// harness). `on_edge` is called once per participant for every change of a
/// combined level, before `set_output` returns. Any latch changes the
/// participant makes in response go into `follow_ups`; the bus applies them
/// in order after every participant has seen the current edge.
pub trait LineObserver {
    fn on_edge(
        &mut self,
        participant: ParticipantId,
        edge: Edge,
        levels: Levels,
        follow_ups: &mut Vec<OutputChange>,
    );
}

/// Observer for callers with no participants to notify.
impl LineObserver for () {
    fn on_edge(&mut self, _: ParticipantId, _: Edge, _: Levels, _: &mut Vec<OutputChange>) {}
}

/// The shared ATN/CLK/DATA bus.
#[derive(Debug, Clone, Default)]
pub struct SerialBus {
    /// Output latch per participant, indexed by [`Line`]. `true` = released.
    latches: Vec<[bool; 3]>,
    levels: Levels,
}

impl SerialBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant. Its latches start released.
    pub fn connect(&mut self) -> ParticipantId {
        self.latches.push([true; 3]);
        ParticipantId(self.latches.len() - 1)
    }

    /// Number of connected participants.
    #[must_use]
    pub fn participants(&self) -> usize {
        self.latches.len()
    }

    /// Combined levels.
    #[must_use]
    pub fn levels(&self) -> Levels {
        self.levels
    }

    /// Combined level of one line.
    #[must_use]
    pub fn level(&self, line: Line) -> bool {
        self.levels.get(line)
    }

    /// A participant's own latch. Unknown participants read released.
    #[must_use]
    pub fn output(&self, participant: ParticipantId, line: Line) -> bool {
        self.latches
            .get(participant.0)
            .is_none_or(|latch| latch[line.index()])
    }

    /// Change one participant's latch and settle the bus.
    ///
    /// Every change of a combined level is reported to every participant,
    /// in connection order, before this returns. Follow-up changes are
    /// applied until nothing more changes. An oscillation that keeps going
    /// past [`MAX_SETTLE_STEPS`] is cut off with a warning; the combined
    /// levels are consistent with the latches either way. Returns `false`
    /// after a cut-off, when participants may need to re-read their latches
    /// through [`SerialBus::output`].
    pub fn set_output(
        &mut self,
        participant: ParticipantId,
        line: Line,
        level: bool,
        observer: &mut impl LineObserver,
    ) -> bool {
        let mut queue = VecDeque::from([OutputChange {
            participant,
            line,
            level,
        }]);
        let mut follow_ups = Vec::new();
        let mut steps = 0;

        while let Some(change) = queue.pop_front() {
            steps += 1;
            if steps > MAX_SETTLE_STEPS {
                log::warn!(
                    "serial bus did not settle after {MAX_SETTLE_STEPS} changes, dropping {} pending",
                    queue.len() + 1
                );
                return false;
            }

            let Some(edge) = self.apply(change) else {
                continue;
            };
            log::trace!(
                "{} {} (participant {})",
                edge.line,
                if edge.level { "released" } else { "asserted" },
                change.participant.0
            );
            for id in 0..self.latches.len() {
                observer.on_edge(ParticipantId(id), edge, self.levels, &mut follow_ups);
                queue.extend(follow_ups.drain(..));
            }
        }
        true
    }

    /// Release every latch without notifying anyone (machine reset).
    pub fn reset(&mut self) {
        for latch in &mut self.latches {
            *latch = [true; 3];
        }
        self.levels = Levels::IDLE;
    }

    /// Store a latch and recompute its line. Returns the edge if the
    /// combined level changed.
    fn apply(&mut self, change: OutputChange) -> Option<Edge> {
        let index = change.line.index();
        let latch = self.latches.get_mut(change.participant.0)?;
        if latch[index] == change.level {
            return None;
        }
        latch[index] = change.level;

        let combined = self.latches.iter().all(|latch| latch[index]);
        if combined == self.levels.get(change.line) {
            return None;
        }
        self.levels.set(change.line, combined);
        Some(Edge {
            line: change.line,
            level: combined,
        })
    }
}

impl Observable for SerialBus {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "atn" => Some(self.levels.atn.into()),
            "clock" => Some(self.levels.clock.into()),
            "data" => Some(self.levels.data.into()),
            "participants" => Some((self.latches.len() as u64).into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["atn", "clock", "data", "participants"]
    }
}
