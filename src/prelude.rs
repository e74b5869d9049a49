pub use crate::age_groups::{AgeGroupBin, AgeGroupIndex, AgeGroups, AgeWeightTable, PairwiseAgeWeights};
pub use crate::contact_groups::{ContextContactGroupsExt, GroupId};
pub use crate::contact_scheduler::{ContactStatistics, ContextContactSchedulerExt, InfectiousContactPlan};
pub use crate::context::{Context, ExecutionPhase};
pub use crate::error::TransmissionError;
pub use crate::geo::{ContextGeoExt, RegionId, SpatialIndex};
pub use crate::group_selection::ContextGroupSelectionExt;
pub use crate::infection_attempt::{ContextInfectionAttemptExt, InfectionAttemptEvent, InfectionAttemptRecord};
pub use crate::log::{debug, error, info, trace, warn};
pub use crate::modifiers::{BehaviorModifier, ContextModifiersExt, ImmunityModifier, TransmissionModifier};
pub use crate::parameters::{ContextParametersExt, Parameters, TransmissionStructure};
pub use crate::partner_sampling::{ContextPartnerSamplingExt, PartnerDraw};
pub use crate::people::{ContextPeopleExt, DiseaseState, DiseaseStateChangeEvent, PersonId, SettingType};
pub use crate::random::ContextRandomExt;
pub use crate::runner::{run_with_args, run_with_custom_args, BaseArgs};
pub use crate::transmission_ratio::ContextTransmissionRatioExt;
pub use crate::{define_data_plugin, define_rng};
