//! A time-indexed sequence of VTK snapshots, collected in a ParaView `.pvd` file.
use crate::fem_error::FemError;
use crate::io::vtk::{FiniteElementMeshDataSetBuilder, VtkCellConnectivity};
use crate::Real;
use log::debug;
use num::ToPrimitive;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
struct SnapshotEntry {
    timestep: f64,
    file_name: String,
}

/// Writes `<basename>_<k>.vtu` for every snapshot and keeps `<basename>.pvd` listing all of
/// them up to date.
#[derive(Debug, Clone)]
pub struct SnapshotSeries {
    directory: PathBuf,
    basename: String,
    entries: Vec<SnapshotEntry>,
}

impl SnapshotSeries {
    /// Creates the output directory if necessary.
    pub fn new(directory: impl Into<PathBuf>, basename: impl Into<String>) -> Result<Self, FemError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            basename: basename.into(),
            entries: Vec::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn pvd_path(&self) -> PathBuf {
        self.directory.join(format!("{}.pvd", self.basename))
    }

    pub fn snapshot_paths(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .map(|entry| self.directory.join(&entry.file_name))
            .collect()
    }

    pub fn timesteps(&self) -> Vec<f64> {
        self.entries.iter().map(|entry| entry.timestep).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exports the data set as the next snapshot, tagged with `timestep`, and rewrites the
    /// collection file. Returns the path of the snapshot.
    pub fn write_snapshot<T, C>(
        &mut self,
        timestep: f64,
        data_set: &FiniteElementMeshDataSetBuilder<T, C>,
    ) -> Result<PathBuf, FemError>
    where
        T: Real + ToPrimitive,
        C: VtkCellConnectivity,
    {
        let file_name = format!("{}_{}.vtu", self.basename, self.entries.len());
        let path = self.directory.join(&file_name);
        data_set.try_export(&path)?;
        self.entries.push(SnapshotEntry { timestep, file_name });
        self.write_collection()?;
        debug!("Wrote snapshot {} (time {timestep})", path.display());
        Ok(path)
    }

    fn write_collection(&self) -> Result<(), FemError> {
        let file = fs::File::create(self.pvd_path())?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "<?xml version=\"1.0\"?>")?;
        writeln!(
            writer,
            "<VTKFile type=\"Collection\" version=\"0.1\" byte_order=\"LittleEndian\">"
        )?;
        writeln!(writer, "  <Collection>")?;
        for entry in &self.entries {
            writeln!(
                writer,
                "    <DataSet timestep=\"{}\" group=\"\" part=\"0\" file=\"{}\"/>",
                entry.timestep, entry.file_name
            )?;
        }
        writeln!(writer, "  </Collection>")?;
        writeln!(writer, "</VTKFile>")?;
        writer.flush()?;
        Ok(())
    }
}
