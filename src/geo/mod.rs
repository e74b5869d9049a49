//! Regions, the spatial index over them, and the radiation mobility model used to choose where
//! a community ("global") contact happens.
//!
//! Regions are registered before the run with `add_region` or `load_regions_from_csv`. The
//! spatial index is either installed explicitly with `set_spatial_index` or, on first use, a
//! `HaversineIndex` over the registered regions is built. Once the index exists the set of
//! regions is frozen.
pub mod radiation;

use std::cell::{OnceCell, RefCell};
use std::fmt::{self, Display};
use std::path::Path;
use std::rc::Rc;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::TransmissionError;
use crate::parameters::ContextParametersExt;
use crate::people::ContextPeopleExt;
use crate::{HashMap, HashMapExt};
pub use radiation::{RadiationFlowCache, RadiationFlowTable};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u32);

impl Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A region and the coordinates of its centroid, in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct Region {
    #[serde(rename = "region_id")]
    pub id: RegionId,
    pub latitude: f64,
    pub longitude: f64,
}

impl Region {
    fn validate(&self) -> Result<(), TransmissionError> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(TransmissionError::Geography(format!(
                "region {} has invalid coordinates ({}, {})",
                self.id, self.latitude, self.longitude
            )));
        }
        Ok(())
    }
}

/// Great-circle distance in kilometres between two points given in degrees.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Finds regions near a point.
pub trait SpatialIndex {
    /// Every region within `max_radius_km` of the point, nearest first, with its distance.
    fn nearest_within(&self, latitude: f64, longitude: f64, max_radius_km: f64) -> Vec<(RegionId, f64)>;
}

/// Spatial index that measures the haversine distance to every region.
pub struct HaversineIndex {
    regions: Vec<Region>,
}

impl HaversineIndex {
    #[must_use]
    pub fn new(regions: Vec<Region>) -> Self {
        HaversineIndex { regions }
    }
}

impl SpatialIndex for HaversineIndex {
    fn nearest_within(&self, latitude: f64, longitude: f64, max_radius_km: f64) -> Vec<(RegionId, f64)> {
        let mut found: Vec<(RegionId, f64)> = self
            .regions
            .iter()
            .map(|region| {
                (
                    region.id,
                    haversine_km(latitude, longitude, region.latitude, region.longitude),
                )
            })
            .filter(|(_, distance)| *distance <= max_radius_km)
            .collect();
        // Ties broken by id so the order never depends on registration order.
        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found
    }
}

struct GeoData {
    regions: HashMap<RegionId, Region>,
    // Registration order, used to build the default index.
    region_order: Vec<RegionId>,
    spatial_index: OnceCell<Box<dyn SpatialIndex>>,
    radiation_cache: RefCell<RadiationFlowCache>,
}

crate::define_data_plugin!(
    GeoPlugin,
    GeoData,
    GeoData {
        regions: HashMap::new(),
        region_order: Vec::new(),
        spatial_index: OnceCell::new(),
        radiation_cache: RefCell::new(RadiationFlowCache::default()),
    }
);

impl GeoData {
    fn spatial_index(&self) -> &dyn SpatialIndex {
        self.spatial_index
            .get_or_init(|| {
                debug!("building haversine index over {} regions", self.region_order.len());
                let regions = self
                    .region_order
                    .iter()
                    .map(|id| self.regions[id])
                    .collect();
                Box::new(HaversineIndex::new(regions))
            })
            .as_ref()
    }
}

pub trait ContextGeoExt {
    /// Registers a region.
    ///
    /// # Errors
    ///
    /// Returns `TransmissionError::Geography` if the id is already registered, the coordinates
    /// are out of range, or the spatial index has already been built.
    fn add_region(&mut self, id: RegionId, latitude: f64, longitude: f64) -> Result<(), TransmissionError>;

    /// Registers every region in a CSV file with the columns `region_id,latitude,longitude`.
    /// Returns the number of regions read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if any region is rejected by
    /// `add_region`.
    fn load_regions_from_csv(&mut self, path: &Path) -> Result<usize, TransmissionError>;

    /// Installs a spatial index in place of the default haversine index. Cached radiation
    /// tables are discarded.
    fn set_spatial_index(&mut self, index: Box<dyn SpatialIndex>);

    fn get_region(&self, id: RegionId) -> Option<&Region>;

    fn get_region_count(&self) -> usize;

    /// Regions within `max_radius_km` of `id`'s centroid, nearest first. `id` itself is
    /// included at distance zero.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a registered region.
    fn regions_near(&self, id: RegionId, max_radius_km: f64) -> Vec<(RegionId, f64)>;

    /// The radiation flow table for `source`, built on first request and then cached. A
    /// source that is not a registered region keeps every trip at home.
    ///
    /// # Panics
    ///
    /// Panics if parameters are not set.
    fn radiation_flow_table(&self, source: RegionId) -> Rc<RadiationFlowTable>;

    /// Discards every cached radiation table so later requests rebuild them from current
    /// populations.
    fn invalidate_radiation_cache(&mut self);
}

impl ContextGeoExt for Context {
    fn add_region(&mut self, id: RegionId, latitude: f64, longitude: f64) -> Result<(), TransmissionError> {
        let region = Region {
            id,
            latitude,
            longitude,
        };
        region.validate()?;

        let data = self.get_data_container_mut(GeoPlugin);
        if data.spatial_index.get().is_some() {
            return Err(TransmissionError::Geography(format!(
                "cannot add region {id} after the spatial index has been built"
            )));
        }
        if data.regions.contains_key(&id) {
            return Err(TransmissionError::Geography(format!(
                "region {id} is already registered"
            )));
        }
        data.regions.insert(id, region);
        data.region_order.push(id);
        Ok(())
    }

    fn load_regions_from_csv(&mut self, path: &Path) -> Result<usize, TransmissionError> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut count = 0;
        for result in reader.deserialize() {
            let region: Region = result?;
            self.add_region(region.id, region.latitude, region.longitude)?;
            count += 1;
        }
        debug!("loaded {count} regions from {}", path.display());
        Ok(count)
    }

    fn set_spatial_index(&mut self, index: Box<dyn SpatialIndex>) {
        let data = self.get_data_container_mut(GeoPlugin);
        data.spatial_index = OnceCell::from(index);
        data.radiation_cache.get_mut().invalidate();
    }

    fn get_region(&self, id: RegionId) -> Option<&Region> {
        self.get_data_container(GeoPlugin)
            .and_then(|data| data.regions.get(&id))
    }

    fn get_region_count(&self) -> usize {
        self.get_data_container(GeoPlugin)
            .map_or(0, |data| data.region_order.len())
    }

    fn regions_near(&self, id: RegionId, max_radius_km: f64) -> Vec<(RegionId, f64)> {
        let data = self
            .get_data_container(GeoPlugin)
            .unwrap_or_else(|| panic!("Region {id} does not exist"));
        let region = data
            .regions
            .get(&id)
            .unwrap_or_else(|| panic!("Region {id} does not exist"));
        data.spatial_index()
            .nearest_within(region.latitude, region.longitude, max_radius_km)
    }

    fn radiation_flow_table(&self, source: RegionId) -> Rc<RadiationFlowTable> {
        let Some(data) = self.get_data_container(GeoPlugin) else {
            warn!("no regions are registered; region {source} uses a self-loop");
            return Rc::new(RadiationFlowTable::self_loop(source));
        };
        if let Some(table) = data.radiation_cache.borrow().get(source) {
            return table;
        }
        if !data.regions.contains_key(&source) {
            warn!("region {source} is not registered; using a self-loop");
            let table = Rc::new(RadiationFlowTable::self_loop(source));
            data.radiation_cache
                .borrow_mut()
                .insert(source, Rc::clone(&table));
            return table;
        }

        let max_radius_km = self.get_parameters().radiation_max_radius_km;
        let neighbours = self
            .regions_near(source, max_radius_km)
            .into_iter()
            .map(|(region, _)| (region, self.count_in(region, None)));
        let table = Rc::new(RadiationFlowTable::build(
            source,
            self.count_in(source, None),
            neighbours,
        ));
        trace!("cached radiation table for region {source}");
        data.radiation_cache
            .borrow_mut()
            .insert(source, Rc::clone(&table));
        table
    }

    fn invalidate_radiation_cache(&mut self) {
        self.get_data_container_mut(GeoPlugin)
            .radiation_cache
            .get_mut()
            .invalidate();
    }
}
