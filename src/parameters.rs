//! Run configuration.
//!
//! `Parameters` is read from JSON once and never changes during a run. Installing it with
//! `set_parameters` validates every value and resolves the name-keyed age tables into dense
//! per-age-group vectors and matrices.

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::age_groups::{AgeGroupBin, AgeGroupIndex, AgeGroups, AgeMatrix, AgeWeightTable, PairwiseAgeWeights};
use crate::context::Context;
use crate::error::TransmissionError;
use crate::people::SettingType;
use crate::{HashMap, HashMapExt};

/// Name-keyed description of how transmission is spread over ages and settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransmissionStructure {
    /// Relative overall transmission weight of each age group.
    #[serde(default)]
    pub transmission_weights: AgeWeightTable,
    /// Per setting, how strongly each age group chooses that setting for a contact. Settings
    /// that are not listed weigh 1.0 for every age group.
    #[serde(default)]
    pub setting_selection_weights: HashMap<SettingType, AgeWeightTable>,
    /// Per setting, source-age × target-age weights used to bias partner choice. Settings that
    /// are not listed choose partners uniformly.
    #[serde(default)]
    pub partner_age_weights: HashMap<SettingType, PairwiseAgeWeights>,
    /// Probability that a home contact of someone living alone becomes a global contact.
    #[serde(default)]
    pub lone_home_global_substitution_probability: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub seed: u64,
    pub max_time: f64,
    pub age_groups: AgeGroups,
    /// Fraction of infections in each age group that become symptomatic.
    pub symptomatic_fraction: AgeWeightTable,
    /// Infectiousness of an asymptomatic infection relative to a symptomatic one.
    pub asymptomatic_infectiousness: f64,
    /// Population-weighted mean transmission ratio the per-age ratios are scaled to.
    pub average_transmission_ratio: f64,
    /// Infectious contacts per unit time for a person with transmission ratio 1.
    pub infectious_contact_rate: f64,
    pub fraction_of_global_contacts_in_home_region: f64,
    pub radiation_max_radius_km: f64,
    #[serde(default)]
    pub transmission: TransmissionStructure,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            seed: 0,
            max_time: 100.0,
            age_groups: AgeGroups::new(vec![AgeGroupBin::new("all", 0)])
                .unwrap_or_else(|e| panic!("{e}")),
            symptomatic_fraction: AgeWeightTable::uniform(1.0),
            asymptomatic_infectiousness: 1.0,
            average_transmission_ratio: 1.0,
            infectious_contact_rate: 1.0,
            fraction_of_global_contacts_in_home_region: 0.0,
            radiation_max_radius_km: 100.0,
            transmission: TransmissionStructure::default(),
        }
    }
}

/// The configuration tables resolved against the age groups.
#[derive(Clone, Debug)]
pub struct ResolvedTables {
    pub transmission_weights: Vec<f64>,
    pub symptomatic_fractions: Vec<f64>,
    pub setting_selection_weights: HashMap<SettingType, Vec<f64>>,
    pub partner_age_weights: HashMap<SettingType, AgeMatrix>,
}

impl ResolvedTables {
    /// Weight with which a person of `age_group` picks `setting`; 1.0 for unlisted settings.
    #[must_use]
    pub fn selection_weight(&self, setting: SettingType, age_group: AgeGroupIndex) -> f64 {
        self.setting_selection_weights
            .get(&setting)
            .map_or(1.0, |weights| weights[age_group.0])
    }

    #[must_use]
    pub fn partner_weights(&self, setting: SettingType) -> Option<&AgeMatrix> {
        self.partner_age_weights.get(&setting)
    }
}

fn check_finite_non_negative(value: f64, name: &str) -> Result<(), TransmissionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TransmissionError::IllegalParameter(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

fn check_probability(value: f64, name: &str) -> Result<(), TransmissionError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TransmissionError::IllegalParameter(format!(
            "{name} must be between 0 and 1, got {value}"
        )))
    }
}

impl Parameters {
    /// Checks every value and resolves the age tables.
    ///
    /// # Errors
    ///
    /// Returns `TransmissionError::IllegalParameter` naming the first offending value.
    pub fn resolve(&self) -> Result<ResolvedTables, TransmissionError> {
        if !(self.max_time.is_finite() && self.max_time > 0.0) {
            return Err(TransmissionError::IllegalParameter(format!(
                "max_time must be a positive number, got {}",
                self.max_time
            )));
        }
        if !(self.infectious_contact_rate.is_finite() && self.infectious_contact_rate > 0.0) {
            return Err(TransmissionError::IllegalParameter(format!(
                "infectious_contact_rate must be a positive number, got {}",
                self.infectious_contact_rate
            )));
        }
        check_finite_non_negative(self.asymptomatic_infectiousness, "asymptomatic_infectiousness")?;
        check_finite_non_negative(self.average_transmission_ratio, "average_transmission_ratio")?;
        check_finite_non_negative(self.radiation_max_radius_km, "radiation_max_radius_km")?;
        check_probability(
            self.fraction_of_global_contacts_in_home_region,
            "fraction_of_global_contacts_in_home_region",
        )?;
        check_probability(
            self.transmission.lone_home_global_substitution_probability,
            "lone_home_global_substitution_probability",
        )?;

        let symptomatic_fractions = self
            .symptomatic_fraction
            .resolve(&self.age_groups, "symptomatic_fraction")?;
        for (index, fraction) in self.age_groups.indices().zip(&symptomatic_fractions) {
            let name = self.age_groups.name(index);
            check_probability(*fraction, &format!("symptomatic_fraction of {name}"))?;
            if fraction + (1.0 - fraction) * self.asymptomatic_infectiousness <= 0.0 {
                return Err(TransmissionError::IllegalParameter(format!(
                    "age group {name} has no infectious infections: symptomatic_fraction and \
                     asymptomatic_infectiousness are both zero"
                )));
            }
        }

        let mut setting_selection_weights = HashMap::new();
        for (setting, table) in &self.transmission.setting_selection_weights {
            let name = format!("setting_selection_weights.{setting}");
            setting_selection_weights.insert(*setting, table.resolve(&self.age_groups, &name)?);
        }
        let mut partner_age_weights = HashMap::new();
        for (setting, table) in &self.transmission.partner_age_weights {
            let name = format!("partner_age_weights.{setting}");
            partner_age_weights.insert(*setting, table.resolve(&self.age_groups, &name)?);
        }

        Ok(ResolvedTables {
            transmission_weights: self
                .transmission
                .transmission_weights
                .resolve(&self.age_groups, "transmission_weights")?,
            symptomatic_fractions,
            setting_selection_weights,
            partner_age_weights,
        })
    }
}

struct ParametersData {
    parameters: Parameters,
    tables: ResolvedTables,
}

crate::define_data_plugin!(ParametersPlugin, Option<ParametersData>, None);

pub trait ContextParametersExt {
    /// Reads parameters from a JSON file and installs them.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON for `Parameters`, or
    /// fails validation.
    fn load_parameters_from_json(&mut self, path: &Path) -> Result<(), TransmissionError>;

    /// Validates and installs `parameters`, replacing any installed before.
    ///
    /// # Errors
    ///
    /// Returns `TransmissionError::IllegalParameter` if validation fails; nothing is installed
    /// in that case.
    fn set_parameters(&mut self, parameters: Parameters) -> Result<(), TransmissionError>;

    /// # Panics
    ///
    /// Panics if no parameters have been installed.
    fn get_parameters(&self) -> &Parameters;

    /// # Panics
    ///
    /// Panics if no parameters have been installed.
    fn get_resolved_tables(&self) -> &ResolvedTables;

    /// The installed parameters, if any.
    fn try_get_parameters(&self) -> Option<&Parameters>;

    fn age_group_for_age(&self, age: u32) -> AgeGroupIndex {
        self.get_parameters().age_groups.group_for_age(age)
    }
}

impl ContextParametersExt for Context {
    fn load_parameters_from_json(&mut self, path: &Path) -> Result<(), TransmissionError> {
        info!("loading parameters from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let parameters: Parameters = serde_json::from_str(&contents)?;
        self.set_parameters(parameters)
    }

    fn set_parameters(&mut self, parameters: Parameters) -> Result<(), TransmissionError> {
        let tables = parameters.resolve()?;
        debug!("installing parameters: {parameters:?}");
        *self.get_data_container_mut(ParametersPlugin) = Some(ParametersData { parameters, tables });
        Ok(())
    }

    fn get_parameters(&self) -> &Parameters {
        &installed(self).parameters
    }

    fn get_resolved_tables(&self) -> &ResolvedTables {
        &installed(self).tables
    }

    fn try_get_parameters(&self) -> Option<&Parameters> {
        self.get_data_container(ParametersPlugin)
            .and_then(Option::as_ref)
            .map(|data| &data.parameters)
    }
}

fn installed(context: &Context) -> &ParametersData {
    context
        .get_data_container(ParametersPlugin)
        .and_then(Option::as_ref)
        .expect("Parameters have not been set")
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const PARAMETERS_JSON: &str = r#"{
        "seed": 42,
        "max_time": 30.0,
        "age_groups": [
            {"name": "child", "min_age": 0},
            {"name": "adult", "min_age": 18}
        ],
        "symptomatic_fraction": {"default": 0.9, "weights": {"child": 0.5}},
        "asymptomatic_infectiousness": 0.5,
        "average_transmission_ratio": 2.0,
        "infectious_contact_rate": 0.4,
        "fraction_of_global_contacts_in_home_region": 0.25,
        "radiation_max_radius_km": 50.0,
        "transmission": {
            "transmission_weights": {"weights": {"child": 1.0, "adult": 2.0}},
            "setting_selection_weights": {
                "school": {"default": 0.0, "weights": {"child": 3.0}}
            },
            "partner_age_weights": {
                "global": {"default": 1.0, "weights": {"child": {"adult": 0.5}}}
            },
            "lone_home_global_substitution_probability": 0.3
        }
    }"#;

    fn parameters() -> Parameters {
        serde_json::from_str(PARAMETERS_JSON).unwrap()
    }

    #[test]
    fn load_and_resolve_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PARAMETERS_JSON.as_bytes()).unwrap();

        let mut context = Context::new();
        context.load_parameters_from_json(file.path()).unwrap();
        assert_eq!(context.get_parameters().seed, 42);
        assert_eq!(context.age_group_for_age(40), AgeGroupIndex(1));

        let tables = context.get_resolved_tables();
        assert_eq!(tables.transmission_weights, vec![1.0, 2.0]);
        assert_eq!(tables.symptomatic_fractions, vec![0.5, 0.9]);
        assert_eq!(tables.selection_weight(SettingType::School, AgeGroupIndex(0)), 3.0);
        assert_eq!(tables.selection_weight(SettingType::School, AgeGroupIndex(1)), 0.0);
        assert_eq!(tables.selection_weight(SettingType::Home, AgeGroupIndex(1)), 1.0);
        let global = tables.partner_weights(SettingType::Global).unwrap();
        assert_eq!(global.get(AgeGroupIndex(0), AgeGroupIndex(1)), 0.5);
        assert_eq!(global.get(AgeGroupIndex(1), AgeGroupIndex(0)), 1.0);
        assert!(tables.partner_weights(SettingType::Work).is_none());
    }

    #[test]
    fn default_parameters_are_valid() {
        assert!(Parameters::default().resolve().is_ok());
    }

    #[test]
    fn unknown_age_group_label_is_rejected() {
        let mut parameters = parameters();
        parameters.transmission.transmission_weights =
            AgeWeightTable::uniform(1.0).with_weight("toddler", 2.0);
        assert!(matches!(
            parameters.resolve(),
            Err(TransmissionError::IllegalParameter(_))
        ));
    }

    #[test]
    fn zero_symptomatic_denominator_is_rejected() {
        let mut parameters = parameters();
        parameters.asymptomatic_infectiousness = 0.0;
        parameters.symptomatic_fraction = AgeWeightTable::uniform(0.0);
        assert!(parameters.resolve().is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut parameters = parameters();
        parameters.fraction_of_global_contacts_in_home_region = 1.5;
        assert!(parameters.resolve().is_err());

        let mut parameters = self::parameters();
        parameters.infectious_contact_rate = 0.0;
        assert!(parameters.resolve().is_err());

        let mut parameters = self::parameters();
        parameters.transmission.lone_home_global_substitution_probability = -0.1;
        assert!(parameters.resolve().is_err());
    }

    #[test]
    fn failed_validation_installs_nothing() {
        let mut context = Context::new();
        let mut bad = parameters();
        bad.max_time = f64::NAN;
        assert!(context.set_parameters(bad).is_err());
        assert!(context.get_data_container(ParametersPlugin).is_none());
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{\"seed\": ").unwrap();
        let mut context = Context::new();
        assert!(matches!(
            context.load_parameters_from_json(file.path()),
            Err(TransmissionError::JsonError(_))
        ));
    }

    #[test]
    #[should_panic(expected = "Parameters have not been set")]
    fn reading_before_setting_panics() {
        let context = Context::new();
        context.get_parameters();
    }
}
