use log::warn;

pub fn print_header_dynamics(integrator: &str, stepsize: f64, t_max: f64) {
    warn!("{:^90}", "");
    warn!("{: ^90}", "LSC-IVR Trajectory");
    warn!("{:-^90}", "");
    warn!("{: <30} {:>59}", "Integrator:", integrator);
    warn!("{: <30} {:>55.4} a.u.", "Step size:", stepsize);
    warn!("{: <30} {:>55.4} a.u.", "Final time:", t_max);
    warn!("{:-^90}", "");
}

pub fn print_header_dynamics_step(step: usize, time: f64) {
    warn!("{:^90}", "");
    warn!(
        "{: ^90}",
        format!("Dynamics Step {} at t = {:.4} a.u.", step, time)
    );
    warn!("{:-^90}", "");
}

pub fn print_footer_dynamics_step(total_energy: f64, drift: f64, timing: f64) {
    warn!("{: <30} {:>59.10}", "Total energy (a.u.):", total_energy);
    warn!("{: <30} {:>57.4} %", "Relative energy loss:", 100.0 * drift);
    warn!("{:>78} {:>8.2} s", "Dynamics Step finished in", timing);
}

pub fn print_footer_dynamics(timing: f64, n_calls: usize) {
    warn!("{:-<90} ", "");
    warn!(
        "{:>78} {:>11}",
        "Electronic structure evaluations:", n_calls
    );
    warn!("{:>78} {:>8.2} s", "Trajectory finished in", timing);
}
