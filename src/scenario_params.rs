use minvent::params::BatchParams;
use simple_error::{try_with, SimpleResult};

const DEFAULT_SCENARIO_YAML: &str = r#"
simulations:
- cell_type: m
  num_cycles: 5
  cycle_length: 1000.0
  solver:
    first_step: 0.01
    max_step: 1.0
    rtol: 0.001
    atol: 0.000001
    max_steps: 1000000
- cell_type: m
  num_cycles: 10
  cycle_length: 500.0
  solver:
    first_step: 0.01
    max_step: 1.0
    rtol: 0.001
    atol: 0.000001
    max_steps: 1000000
technical_params:
  num_threads: 1
  pin_threads: false
"#;

pub fn get_scenario_params() -> SimpleResult<BatchParams> {
    parse_scenario_params(DEFAULT_SCENARIO_YAML)
}

pub fn load_scenario_params(path: Option<&str>) -> SimpleResult<BatchParams> {
    match path {
        Some(path) => {
            let yaml = try_with!(std::fs::read_to_string(path), "cannot read {}", path);
            parse_scenario_params(&yaml)
        }
        None => get_scenario_params(),
    }
}

fn parse_scenario_params(yaml: &str) -> SimpleResult<BatchParams> {
    let params: BatchParams = try_with!(serde_yaml::from_str(yaml), "invalid scenario yaml");
    try_with!(
        minvent::params::validate_batch_params(&params),
        "invalid scenario parameters"
    );
    Ok(params)
}
