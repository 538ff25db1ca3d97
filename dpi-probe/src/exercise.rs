//! Sample calls through the declared imports
//!
//! One round calls every import at least once with pipeline-looking values.
//! Rounds run in parallel on the rayon pool when more than one is requested.

use crate::config::ExerciseConfig;
use dpi_dispatch::callbacks;
use rayon::prelude::*;

const STAGES: [&str; 5] = ["IF", "ID", "EX", "MEM", "WB"];

/// Calls made by one round
pub const CALLS_PER_ROUND: usize = 5 + STAGES.len();

fn round(header: &str, index: usize) {
    let cycle = index as i32;

    callbacks::print_header(header);
    callbacks::print_cycles();
    for (slot, stage) in STAGES.iter().enumerate() {
        callbacks::print_stage(stage, cycle, (slot as i32) * 4, 1);
    }
    callbacks::print_reg(cycle, 1, 0, 0);
    callbacks::print_membus(cycle, 0, 0x1000, 0, 1, 0);
    callbacks::print_close();
}

/// Run the configured rounds; returns the number of calls made
pub fn run(config: &ExerciseConfig) -> usize {
    let rounds = config.repeat.max(1);
    log::info!("Exercising declared imports: {} round(s)", rounds);

    if rounds == 1 {
        round(&config.header, 0);
    } else {
        (0..rounds)
            .into_par_iter()
            .for_each(|index| round(&config.header, index));
    }

    rounds * CALLS_PER_ROUND
}
