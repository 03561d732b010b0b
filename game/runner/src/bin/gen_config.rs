use meshrunner::config::RunnerConfig;
use std::env;

fn main() {
    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "runner.toml".to_string());
    serdeconv::to_toml_file(&RunnerConfig::default(), &path)
        .expect("Error writing runner configuration file");
    println!("wrote {}", path);
}
