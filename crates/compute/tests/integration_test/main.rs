/// Integration tests for the leak pipeline: training, detection,
/// localization, evaluation and shared detector state.

mod helpers;
mod pipeline;
mod state;
