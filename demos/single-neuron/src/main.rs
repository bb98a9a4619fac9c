//! Runs  scenario 1: a single leaky integrate-and-fire neuron driven
//! by one excitatory spike of weight 500 pA at t = 10 ms. Reports the
//! membrane trajectory's peak and confirms no spike is emitted.

use esk_kernel::{Population, Simulation};
use esk_neuron::{LifPscAlpha, LifPscAlphaParams};
use esk_types::NodeId;

const H: f64 = 0.1; // ms
const RUN_MS: f64 = 30.0;
const INPUT_AT_MS: f64 = 10.0;
const INPUT_WEIGHT: f64 = 500.0; // pA

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let neuron = LifPscAlpha::new(LifPscAlphaParams {
        c_m: 250.0,
        tau_m: 10.0,
        tau_syn_ex: 2.0,
        tau_syn_in: 2.0,
        v_th: -55.0,
        v_reset: -70.0,
        e_l: -70.0,
        t_ref: 2.0,
        i_e: 0.0,
    })?;

    let id = NodeId::new(1);
    let population = Population::new(vec![(id, neuron)], 1);
    let mut sim = Simulation::new(population, vec![], H, 1)?;

    let input_step = (INPUT_AT_MS / H).round() as i64;
    let total_windows = (RUN_MS / H).round() as usize;

    let mut peak = f64::MIN;
    let mut peak_ms = 0.0;
    let mut spiked = false;

    for w in 0..total_windows {
        if sim.window_start() == input_step {
            log::info!("injecting {INPUT_WEIGHT} pA excitatory spike at t = {INPUT_AT_MS} ms");
            sim.inject_external(id, INPUT_WEIGHT, 0);
        }
        let emitted = sim.run_window();
        if emitted > 0 {
            spiked = true;
        }
        let v = sim.population().v_m(id).unwrap();
        if v > peak {
            peak = v;
            peak_ms = (w + 1) as f64 * H;
        }
    }

    println!("peak V_m = {peak:.3} mV at t = {peak_ms:.1} ms");
    println!("spike emitted: {spiked}");
    if !spiked && (11.5..=13.5).contains(&peak_ms) {
        println!("scenario 1: PASS");
    } else {
        println!("scenario 1: FAIL (expected peak in [11.5, 13.5] ms, no spike)");
    }

    Ok(())
}
