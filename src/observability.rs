use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("clix.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("clix.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("clix.client.request_duration_seconds");

pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("clix.stream.fragments");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("clix.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("clix.stream.bytes");

pub(crate) static RENDER_REDRAWS: Counter = Counter::new("clix.render.redraws");
pub(crate) static RENDER_TTFF: Moments = Moments::new("clix.render.first_fragment_seconds");

pub(crate) static SESSION_TURNS: Counter = Counter::new("clix.session.turns");
pub(crate) static SESSION_TURN_FAILURES: Counter = Counter::new("clix.session.turn_failures");

pub(crate) static HISTORY_LOADS: Counter = Counter::new("clix.history.loads");
pub(crate) static HISTORY_CORRUPT: Counter = Counter::new("clix.history.corrupt");
pub(crate) static HISTORY_SAVES: Counter = Counter::new("clix.history.saves");
pub(crate) static HISTORY_DELETES: Counter = Counter::new("clix.history.deletes");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&RENDER_REDRAWS);
    collector.register_moments(&RENDER_TTFF);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_TURN_FAILURES);

    collector.register_counter(&HISTORY_LOADS);
    collector.register_counter(&HISTORY_CORRUPT);
    collector.register_counter(&HISTORY_SAVES);
    collector.register_counter(&HISTORY_DELETES);
}
