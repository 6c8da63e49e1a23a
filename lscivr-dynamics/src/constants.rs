// atomic mass unit in units of the electron mass
pub const AMU_TO_AU: f64 = 1822.888486;
pub const BOHR_TO_ANGS: f64 = 0.52917721067;
pub const ANGS_TO_BOHR: f64 = 1.0 / BOHR_TO_ANGS;
// femtoseconds per atomic unit of time
pub const AU_TO_FS: f64 = 0.02418884326;
