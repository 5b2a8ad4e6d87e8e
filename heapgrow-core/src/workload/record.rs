use crate::resp::Command;
use rand::Rng;

/// One randomized point write; ownership of the object passes to the server
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub ttl: f64,
}

impl WriteRecord {
    /// `SET <collection> <id> EX <ttl> POINT <lat> <lon>`
    pub fn to_command(&self, collection: &str) -> Command {
        Command::new("SET")
            .arg(collection)
            .arg(&self.id)
            .arg("EX")
            .arg(self.ttl)
            .arg("POINT")
            .arg(self.lat)
            .arg(self.lon)
    }
}

/// Draws positions and TTLs for write records
#[derive(Debug, Clone, Copy)]
pub struct RecordSampler {
    min_ttl: f64,
    max_ttl: f64,
}

impl RecordSampler {
    /// Callers validate `min_ttl <= max_ttl` up front (see `WorkloadConfig::validate`)
    pub fn new(min_ttl: f64, max_ttl: f64) -> Self {
        debug_assert!(min_ttl <= max_ttl);
        Self { min_ttl, max_ttl }
    }

    /// Latitude in [-90, 90)
    pub fn latitude<R: Rng>(rng: &mut R) -> f64 {
        rng.gen::<f64>() * 180.0 - 90.0
    }

    /// Longitude in [-180, 180)
    pub fn longitude<R: Rng>(rng: &mut R) -> f64 {
        rng.gen::<f64>() * 360.0 - 180.0
    }

    /// TTL in [min_ttl, max_ttl], exactly `min_ttl` when the bounds coincide
    pub fn ttl<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.min_ttl >= self.max_ttl {
            return self.min_ttl;
        }
        rng.gen_range(self.min_ttl..=self.max_ttl)
    }

    pub fn sample<R: Rng>(&self, rng: &mut R, id: String) -> WriteRecord {
        WriteRecord { id, lat: Self::latitude(rng), lon: Self::longitude(rng), ttl: self.ttl(rng) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn samples_stay_in_range() {
        let sampler = RecordSampler::new(10.0, 20.0);
        let mut rng = StdRng::seed_from_u64(42);
        for i in 0..10_000 {
            let rec = sampler.sample(&mut rng, i.to_string());
            assert!((-90.0..90.0).contains(&rec.lat), "lat {}", rec.lat);
            assert!((-180.0..180.0).contains(&rec.lon), "lon {}", rec.lon);
            assert!((10.0..=20.0).contains(&rec.ttl), "ttl {}", rec.ttl);
        }
    }

    #[test]
    fn equal_bounds_give_constant_ttl() {
        let sampler = RecordSampler::new(30.0, 30.0);
        let mut rng = StdRng::from_entropy();
        for _ in 0..1000 {
            assert_eq!(sampler.ttl(&mut rng), 30.0);
        }
    }

    #[test]
    fn command_carries_expiry_and_point() {
        let rec = WriteRecord { id: "ab12".into(), lat: 33.5, lon: -112.25, ttl: 30.0 };
        assert_eq!(
            rec.to_command("__tmpkey__").to_string(),
            "SET __tmpkey__ ab12 EX 30 POINT 33.5 -112.25"
        );
    }
}
