// End-to-end tests for the narration API
//
// Each test starts the full router on an ephemeral port with an in-memory key
// repository and a scripted synthesizer standing in for the speech provider,
// then drives it over HTTP with a hyper client.

mod helpers;
mod test_health;
mod test_jobs;
mod test_keys;
