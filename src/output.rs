use crate::core::space_heat_demand::building::BuildingState;
use csv::WriterBuilder;
use serde::Serialize;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub trait Output: Debug {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write>;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Writes each location to its own file in a directory. The `{}` placeholder
/// in the file template is replaced by the location key.
#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }

    fn file_name(&self, location_key: &str) -> String {
        self.file_template.replacen("{}", location_key, 1)
    }
}

impl Output for FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        Ok(BufWriter::new(File::create(
            self.directory_path.join(self.file_name(location_key)),
        )?))
    }
}

impl Output for &FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        <FileOutput as Output>::writer_for_location_key(self, location_key)
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_location_key(&self, _location_key: &str) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// One row of the per-timestep results of an archetype
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: usize,
    /// hours from the start of the year
    pub time: f64,
    pub indoor_temp: f64,
    pub indoor_hum: f64,
    pub indoor_rhum: f64,
    pub sens_cool_demand: f64,
    pub sens_heat_demand: f64,
    pub dehum_demand: f64,
    pub cop_adj: f64,
    pub cool_consump: f64,
    pub heat_consump: f64,
    pub unmet_cool_load: f64,
    pub unmet_heat_load: f64,
    pub sens_waste: f64,
    pub lat_waste: f64,
    pub sens_waste_canyon: f64,
    pub elec_total: f64,
    pub gas_total: f64,
}

impl StepRecord {
    pub fn new(step: usize, time: f64, state: &BuildingState) -> Self {
        Self {
            step,
            time,
            indoor_temp: state.indoor_temp,
            indoor_hum: state.indoor_hum,
            indoor_rhum: state.indoor_rhum,
            sens_cool_demand: state.sens_cool_demand,
            sens_heat_demand: state.sens_heat_demand,
            dehum_demand: state.dehum_demand,
            cop_adj: state.cop_adj,
            cool_consump: state.cool_consump,
            heat_consump: state.heat_consump,
            unmet_cool_load: state.unmet_cool_load,
            unmet_heat_load: state.unmet_heat_load,
            sens_waste: state.sens_waste,
            lat_waste: state.lat_waste,
            sens_waste_canyon: state.sens_waste_canyon,
            elec_total: state.elec_total,
            gas_total: state.gas_total,
        }
    }
}

/// Write the results of one archetype as CSV under the given location key
pub fn write_step_records(
    output: &impl Output,
    location_key: &str,
    records: &[StepRecord],
) -> anyhow::Result<()> {
    if output.is_noop() {
        return Ok(());
    }
    let mut writer = WriterBuilder::new().from_writer(output.writer_for_location_key(location_key)?);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct MemoryOutput {
        buffer: Rc<RefCell<Vec<u8>>>,
    }

    struct MemoryWriter(Rc<RefCell<Vec<u8>>>);

    impl Write for MemoryWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Output for MemoryOutput {
        fn writer_for_location_key(&self, _location_key: &str) -> anyhow::Result<impl Write> {
            Ok(MemoryWriter(self.buffer.clone()))
        }
    }

    #[rstest]
    fn should_write_header_and_rows() {
        let output = MemoryOutput::default();
        let state = BuildingState {
            indoor_temp: 297.,
            elec_total: 12.5,
            ..Default::default()
        };
        write_step_records(
            &output,
            "LargeOffice",
            &[StepRecord::new(1, 0.0833, &state)],
        )
        .unwrap();

        let written = String::from_utf8(output.buffer.borrow().clone()).unwrap();
        let mut lines = written.lines();
        assert!(lines
            .next()
            .unwrap()
            .starts_with("step,time,indoor_temp,indoor_hum"));
        assert!(lines.next().unwrap().starts_with("1,0.0833,297.0,0.0"));
    }

    #[rstest]
    fn should_fill_location_key_into_file_template() {
        let output = FileOutput::new(PathBuf::from("/tmp"), "{}__results.csv".to_string());
        assert_eq!(output.file_name("WareHouse"), "WareHouse__results.csv");
    }

    #[rstest]
    fn should_skip_writing_to_sink() {
        assert!(write_step_records(&SinkOutput, "any", &[]).is_ok());
    }
}
