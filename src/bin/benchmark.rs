use std::time::Instant;

use minvent::{get_model_parameters, run_model};

fn main() {
    env_logger::init();

    let num_repetitions = 20;
    let num_cycles = 10;
    let cycle_length = 500.0;

    for cell_type in ["epi", "endo", "m"] {
        let params = get_model_parameters(cell_type).unwrap();
        let mut sample_count = 0usize;
        let mut checksum = 0.0;

        let wall_start = Instant::now();

        for _ in 0..num_repetitions {
            let trajectory = run_model(num_cycles, cycle_length, &params).unwrap();
            sample_count += trajectory.len();
            checksum += trajectory.states.iter().map(|state| state.u).sum::<f64>();
        }

        let wall_time = wall_start.elapsed();
        let cycles_simulated = (num_repetitions * num_cycles) as f64;

        eprintln!("{}:", cell_type);
        eprintln!(
            "...wall time per cycle: {:.3} ms",
            1e3 * wall_time.as_secs_f64() / cycles_simulated
        );
        eprintln!(
            "...samples per cycle: {:.1}",
            sample_count as f64 / cycles_simulated
        );
        eprintln!("...checksum: {}", checksum);
    }
}
