//! Synthetic sensor feed
//!
//! Random-walk sensors that only publish when the value has moved far enough
//! or has been quiet for too long, like real report-by-exception devices.

use rand::Rng;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FakeSensorConfig {
    pub topic: String,
    pub min_value: f64,
    pub max_value: f64,
    /// Largest change per read
    pub max_delta: f64,
    /// Publish when the value moved at least this much (default 1)
    pub min_report_delta: Option<f64>,
    /// Publish at least this often (default 60s)
    pub max_report_interval: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub topic: String,
    pub value: f64,
}

impl Reading {
    /// `<topic> <value>`, the feed line format `aggrolog` reads
    pub fn to_feed_line(&self) -> String {
        format!("{} {}", self.topic, self.value)
    }
}

#[derive(Debug)]
pub struct FakeSensor {
    config: FakeSensorConfig,
    value: f64,
    last_report: Option<(Instant, f64)>,
}

impl FakeSensor {
    pub fn new<R: Rng + ?Sized>(config: FakeSensorConfig, rng: &mut R) -> Self {
        let mut sensor = Self {
            value: config.min_value,
            config,
            last_report: None,
        };
        sensor.reset(rng);
        sensor
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Jump to a uniformly random value in range
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let span = self.config.max_value - self.config.min_value;
        self.value = self.config.min_value + rng.gen::<f64>() * span;
    }

    /// One random-walk step, biased back into range when outside it
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let offset = if self.value > self.config.max_value {
            -1.0
        } else if self.value < self.config.min_value {
            0.0
        } else {
            -0.5
        };
        self.value += (rng.gen::<f64>() + offset) * 2.0 * self.config.max_delta;
    }

    fn should_report(&self, now: Instant) -> bool {
        let min_delta = self.config.min_report_delta.unwrap_or(1.0);
        let max_interval = self.config.max_report_interval.unwrap_or(Duration::from_secs(60));

        match self.last_report {
            None => true,
            Some((at, last)) => {
                (self.value - last).abs() >= min_delta || now.saturating_duration_since(at) > max_interval
            }
        }
    }

    /// Step, then return a reading if it should be published.
    pub fn read<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> Option<Reading> {
        self.step(rng);
        if !self.should_report(now) {
            return None;
        }
        self.last_report = Some((now, self.value));
        Some(Reading {
            topic: self.config.topic.clone(),
            value: self.value,
        })
    }
}

pub struct SensorSimulator {
    sensors: Vec<FakeSensor>,
    read_interval: Duration,
}

impl SensorSimulator {
    pub fn new<R: Rng + ?Sized>(configs: Vec<FakeSensorConfig>, read_interval: Duration, rng: &mut R) -> Self {
        Self {
            sensors: configs.into_iter().map(|c| FakeSensor::new(c, rng)).collect(),
            read_interval,
        }
    }

    pub fn read_interval(&self) -> Duration {
        self.read_interval
    }

    pub fn sensors(&self) -> &[FakeSensor] {
        &self.sensors
    }

    /// Read every sensor once
    pub fn poll<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> Vec<Reading> {
        self.sensors
            .iter_mut()
            .filter_map(|s| s.read(now, rng))
            .collect()
    }
}

/// Two DHT-style devices reporting temperature and humidity under `node_id`
pub fn default_sensors(node_id: &str) -> Vec<FakeSensorConfig> {
    let properties = [("temperature", -100.0, 200.0), ("humidity", 0.0, 100.0)];

    ["dht1", "dht2"]
        .iter()
        .flat_map(|dev| {
            properties.iter().map(move |(prop, min, max)| FakeSensorConfig {
                topic: format!("{}/{}/{}", node_id, dev, prop),
                min_value: *min,
                max_value: *max,
                max_delta: 0.25,
                min_report_delta: Some(0.5),
                max_report_interval: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(min_report_delta: f64) -> FakeSensorConfig {
        FakeSensorConfig {
            topic: "node/dev/temp".to_string(),
            min_value: 0.0,
            max_value: 10.0,
            max_delta: 0.25,
            min_report_delta: Some(min_report_delta),
            max_report_interval: Some(Duration::from_secs(60)),
        }
    }

    #[test]
    fn test_default_sensors() {
        let sensors = default_sensors("AA:BB:CC:DD:EE:FF");
        assert_eq!(sensors.len(), 4);
        assert_eq!(sensors[0].topic, "AA:BB:CC:DD:EE:FF/dht1/temperature");
        assert_eq!(sensors[3].topic, "AA:BB:CC:DD:EE:FF/dht2/humidity");
        assert_eq!(sensors[1].min_value, 0.0);
        assert_eq!(sensors[1].max_value, 100.0);
    }

    #[test]
    fn test_step_stays_within_max_delta() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut sensor = FakeSensor::new(config(1.0), &mut rng);

        for _ in 0..1000 {
            let before = sensor.value();
            sensor.step(&mut rng);
            assert!((sensor.value() - before).abs() <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn test_out_of_range_walks_back() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut sensor = FakeSensor::new(config(1.0), &mut rng);
        sensor.value = 50.0;

        sensor.step(&mut rng);
        assert!(sensor.value() <= 50.0);
    }

    #[test]
    fn test_reports_on_first_read_then_on_delta_or_timeout() {
        let mut rng = StdRng::seed_from_u64(11);
        // Delta large enough that a handful of steps can never reach it
        let mut sensor = FakeSensor::new(config(100.0), &mut rng);
        let start = Instant::now();

        assert!(sensor.read(start, &mut rng).is_some());
        assert!(sensor.read(start + Duration::from_secs(2), &mut rng).is_none());
        assert!(sensor.read(start + Duration::from_secs(30), &mut rng).is_none());
        assert!(sensor.read(start + Duration::from_secs(61), &mut rng).is_some());
    }

    #[test]
    fn test_poll_and_feed_line() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut sim = SensorSimulator::new(default_sensors("n"), Duration::from_secs(2), &mut rng);

        let readings = sim.poll(Instant::now(), &mut rng);
        assert_eq!(readings.len(), 4);
        let line = readings[0].to_feed_line();
        assert!(line.starts_with("n/dht1/temperature "));
        assert!(line.split(' ').nth(1).unwrap().parse::<f64>().is_ok());
    }
}
