use clap::Args;
use georeminder_core::{format_distance, Coordinate};

#[derive(Args)]
pub struct DistanceArgs {
    /// Latitude of the first point
    #[arg(allow_negative_numbers = true)]
    lat1: f64,
    /// Longitude of the first point
    #[arg(allow_negative_numbers = true)]
    lng1: f64,
    /// Latitude of the second point
    #[arg(allow_negative_numbers = true)]
    lat2: f64,
    /// Longitude of the second point
    #[arg(allow_negative_numbers = true)]
    lng2: f64,
    /// Print "850m" / "1.2km" instead of raw meters
    #[arg(long)]
    format: bool,
}

pub fn run(args: DistanceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let from = Coordinate::new(args.lat1, args.lng1);
    let to = Coordinate::new(args.lat2, args.lng2);
    from.validate()?;
    to.validate()?;

    let meters = from.distance_to(&to);
    if args.format {
        println!("{}", format_distance(meters));
    } else {
        println!("{meters:.3}");
    }
    Ok(())
}
