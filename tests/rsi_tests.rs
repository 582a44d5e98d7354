use quanta_stream::error::AppError;
use quanta_stream::indicator::rsi::Rsi;
use quanta_stream::indicator::Indicator;

fn feed(rsi: &mut Rsi, prices: &[f64]) -> Vec<f64> {
    prices.iter().map(|p| rsi.update(*p)).collect()
}

#[test]
fn needs_period_plus_one_prices() {
    let mut rsi = Rsi::new(3).unwrap();
    let out = feed(&mut rsi, &[1.0, 2.0, 3.0]);
    assert_eq!(out, vec![0.0, 0.0, 0.0]);
    assert!(!rsi.is_ready());

    let v = rsi.update(4.0);
    assert!(rsi.is_ready());
    assert!((v - 100.0).abs() < f64::EPSILON);
}

#[test]
fn only_losses_give_zero() {
    let mut rsi = Rsi::new(3).unwrap();
    let out = feed(&mut rsi, &[4.0, 3.0, 2.0, 1.0]);
    assert!(rsi.is_ready());
    assert!(out[3].abs() < f64::EPSILON);
}

#[test]
fn wilder_smoothing_after_seed() {
    let mut rsi = Rsi::new(3).unwrap();
    let out = feed(&mut rsi, &[1.0, 2.0, 1.0, 2.0, 1.0]);

    // Seed: gains 2/3, losses 1/3.
    assert!((out[3] - 200.0 / 3.0).abs() < 1e-9);
    // Then gain 4/9, loss 5/9.
    assert!((out[4] - 44.444).abs() < 0.5);
    assert!((rsi.avg_gain() - 4.0 / 9.0).abs() < 1e-12);
    assert!((rsi.avg_loss() - 5.0 / 9.0).abs() < 1e-12);
}

#[test]
fn flat_prices_after_seed_read_fully_bullish() {
    let mut rsi = Rsi::new(2).unwrap();
    let out = feed(&mut rsi, &[5.0, 5.0, 5.0, 5.0]);
    assert!(rsi.is_ready());
    assert!((out[3] - 100.0).abs() < f64::EPSILON);
}

#[test]
fn stays_in_range_on_noisy_input() {
    let mut rsi = Rsi::new(14).unwrap();
    for i in 0..500 {
        let price = 100.0 + ((i * 37) % 23) as f64 - 11.0;
        let v = rsi.update(price);
        assert!((0.0..=100.0).contains(&v), "rsi {} out of range at {}", v, i);
    }
    assert_eq!(rsi.recent_prices().len(), 15);
}

#[test]
fn zero_period_is_rejected() {
    assert!(matches!(Rsi::new(0), Err(AppError::InvalidConfiguration(_))));
}
