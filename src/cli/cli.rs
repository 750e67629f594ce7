use clap::Parser;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(short, long, default_value = "gridsite.ini")]
    config: String,

    #[arg(short, long, default_value = "grid.json")]
    grid: String,

    #[arg(short, long, default_value = "stations.csv")]
    stations: String,

    #[arg(short = 'p', long, help = "Hourly load and generation series CSV")]
    series: Option<String>,

    #[arg(short, long, default_value = "output")]
    output_dir: String,

    #[arg(long, default_value_t = false, help = "Re-solve with a uniform boost until the shortfall clears")]
    iterate_shortfall: bool,

    #[arg(long, help = "Write the spliced catalogue back out to this path")]
    save_stations: Option<String>,

    #[arg(long, default_value_t = false)]
    no_progress: bool,
}

// Add getter methods for all fields
impl Args {
    pub fn config(&self) -> &str {
        &self.config
    }

    pub fn grid(&self) -> &str {
        &self.grid
    }

    pub fn stations(&self) -> &str {
        &self.stations
    }

    pub fn series(&self) -> Option<&str> {
        self.series.as_deref()
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    pub fn iterate_shortfall(&self) -> bool {
        self.iterate_shortfall
    }

    pub fn save_stations(&self) -> Option<&str> {
        self.save_stations.as_deref()
    }

    pub fn no_progress(&self) -> bool {
        self.no_progress
    }
}
