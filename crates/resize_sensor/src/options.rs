//! Sensor configuration

/// Configuration shared by every sensor of a context
///
/// The defaults produce the markup
///
/// ```text
/// <resize-sensor class="resize-sensor" data-resize-sensor="…">
///     <div class="resize-sensor-detector resize-sensor-expand"><div/></div>
///     <div class="resize-sensor-detector resize-sensor-shrink"><div/></div>
/// </resize-sensor>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SensorOptions {
    /// Tag name of the overlay container
    pub tag_name: String,
    /// Marker class on the overlay container; scroll delegation matches it
    pub sensor_class: String,
    /// Class shared by both detector panes
    pub detector_class: String,
    /// Class of the pane that detects growth
    pub expand_class: String,
    /// Class of the pane that detects shrinking
    pub shrink_class: String,
    /// Size in pixels of the expand pane's content and the re-arm scroll offset
    pub expand_extent: i32,
    /// Size of the shrink pane's content relative to the pane, in percent
    pub shrink_ratio: u32,
    /// Element attribute holding the element identity
    pub identity_attribute: String,
    /// Container attribute holding the sensor key
    pub sensor_attribute: String,
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self {
            tag_name: "resize-sensor".to_string(),
            sensor_class: "resize-sensor".to_string(),
            detector_class: "resize-sensor-detector".to_string(),
            expand_class: "resize-sensor-expand".to_string(),
            shrink_class: "resize-sensor-shrink".to_string(),
            expand_extent: 100_000,
            shrink_ratio: 200,
            identity_attribute: "data-rs-guid".to_string(),
            sensor_attribute: "data-resize-sensor".to_string(),
        }
    }
}

impl SensorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the overlay container's tag name
    pub fn with_tag_name(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = tag_name.into();
        self
    }

    /// Set the marker class used to recognize overlay containers
    pub fn with_sensor_class(mut self, class: impl Into<String>) -> Self {
        self.sensor_class = class.into();
        self
    }

    /// Set the expand pane extent in pixels
    pub fn with_expand_extent(mut self, extent: i32) -> Self {
        self.expand_extent = extent;
        self
    }

    /// Set the shrink pane's content ratio in percent
    pub fn with_shrink_ratio(mut self, percent: u32) -> Self {
        self.shrink_ratio = percent;
        self
    }

    /// Set the attribute used to store element identities
    pub fn with_identity_attribute(mut self, name: impl Into<String>) -> Self {
        self.identity_attribute = name.into();
        self
    }

    pub(crate) fn expand_pane_class(&self) -> String {
        format!("{} {}", self.detector_class, self.expand_class)
    }

    pub(crate) fn shrink_pane_class(&self) -> String {
        format!("{} {}", self.detector_class, self.shrink_class)
    }
}
