use itertools::Itertools;
use lscivr_dynamics::constants::BOHR_TO_ANGS;
use ndarray::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

// input lines of the program are limited to 80 columns
const LINE_WIDTH: usize = 72;

fn format_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(text) => text.clone(),
        toml::Value::Integer(number) => number.to_string(),
        toml::Value::Float(number) => format!("{:?}", number),
        toml::Value::Boolean(true) => String::from(".true."),
        toml::Value::Boolean(false) => String::from(".false."),
        toml::Value::Array(values) => values.iter().map(format_value).join(","),
        other => other.to_string(),
    }
}

/// Renders one option group, e.g. ` $contrl scftyp=mcscf runtyp=nacme $end`.
/// Long groups are continued on indented lines.
pub fn format_group(name: &str, options: &BTreeMap<String, toml::Value>) -> String {
    let mut text: String = format!(" ${}", name);
    let mut line_length: usize = text.len();
    let indent: usize = name.len() + 3;
    for (key, value) in options.iter() {
        let entry: String = format!("{}={}", key, format_value(value));
        if line_length + entry.len() + 1 > LINE_WIDTH && line_length > indent {
            text.push('\n');
            text.push_str(&" ".repeat(indent - 1));
            line_length = indent - 1;
        }
        text.push(' ');
        text.push_str(&entry);
        line_length += entry.len() + 1;
    }
    text.push_str(" $end\n");
    text
}

/// Complete input of one job: all option groups, the geometry in angstrom and
/// the orbitals of the previous job as initial guess.
pub fn write_input(
    groups: &BTreeMap<String, BTreeMap<String, toml::Value>>,
    labels: &[String],
    masses: ArrayView1<f64>,
    coordinates: ArrayView1<f64>,
    orbitals: Option<&str>,
) -> String {
    let mut input: String = groups
        .iter()
        .map(|(name, options)| format_group(name, options))
        .collect();

    input.push_str(" $data\n");
    input.push_str("lscivr trajectory\n");
    input.push_str("C1\n");
    for ((label, mass), position) in labels
        .iter()
        .zip(masses.iter())
        .zip(coordinates.exact_chunks(3))
    {
        let _ = writeln!(
            input,
            "{:<4}{:>8.1}{:>22.12}{:>22.12}{:>22.12}",
            label,
            mass,
            position[0] * BOHR_TO_ANGS,
            position[1] * BOHR_TO_ANGS,
            position[2] * BOHR_TO_ANGS
        );
    }
    input.push_str(" $end\n");

    if let Some(orbitals) = orbitals {
        input.push_str(orbitals);
        if !orbitals.ends_with('\n') {
            input.push('\n');
        }
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contrl() -> BTreeMap<String, toml::Value> {
        let mut options = BTreeMap::new();
        options.insert(String::from("scftyp"), toml::Value::String(String::from("mcscf")));
        options.insert(String::from("runtyp"), toml::Value::String(String::from("nacme")));
        options.insert(String::from("mult"), toml::Value::Integer(1));
        options.insert(String::from("nosym"), toml::Value::Boolean(true));
        options
    }

    #[test]
    fn option_groups() {
        assert_eq!(
            format_group("contrl", &contrl()),
            " $contrl mult=1 nosym=.true. runtyp=nacme scftyp=mcscf $end\n"
        );

        let mut det = BTreeMap::new();
        det.insert(String::from("wstate"), toml::Value::Array(vec![
            toml::Value::Float(0.5),
            toml::Value::Float(0.5),
        ]));
        assert_eq!(format_group("det", &det), " $det wstate=0.5,0.5 $end\n");

        let mut long = BTreeMap::new();
        for index in 0..12 {
            long.insert(format!("keyword{:02}", index), toml::Value::Integer(index));
        }
        let text = format_group("cpmchf", &long);
        assert!(text.lines().count() > 1);
        assert!(text.lines().all(|line| line.len() <= 80));
        assert!(text.lines().nth(1).unwrap().starts_with("         keyword"));
    }

    #[test]
    fn geometry_and_guess_orbitals() {
        let mut groups = BTreeMap::new();
        groups.insert(String::from("contrl"), contrl());
        let labels = vec![String::from("H"), String::from("H")];
        let masses = array![1.0078, 1.0078];
        let coordinates = array![0.0, 0.0, -0.7, 0.0, 0.0, 0.7];
        let orbitals = " $VEC\n 1  1 1.0E+00\n $END";

        let input = write_input(&groups, &labels, masses.view(), coordinates.view(), Some(orbitals));
        let lines: Vec<&str> = input.lines().collect();
        assert_eq!(lines[0], " $contrl mult=1 nosym=.true. runtyp=nacme scftyp=mcscf $end");
        assert_eq!(lines[1], " $data");
        assert_eq!(lines[3], "C1");
        let words: Vec<&str> = lines[5].split_whitespace().collect();
        assert_eq!(words[0], "H");
        assert_eq!(words[1], "1.0");
        let z: f64 = words[4].parse().unwrap();
        assert!((z - 0.7 * BOHR_TO_ANGS).abs() < 1e-11);
        assert_eq!(lines[6], " $end");
        assert_eq!(lines[7], " $VEC");
        assert!(input.ends_with(" $END\n"));

        let without = write_input(&groups, &labels, masses.view(), coordinates.view(), None);
        assert!(without.ends_with(" $end\n"));
        assert!(!without.contains("$VEC"));
    }
}
