use float_cmp::approx_eq;
use ndarray::{Array1, Array2, Array4};
use netcdf::create;
use ocean_climo::analysis::{Analysis, MapRenderer, StateMap};
use ocean_climo::catalog::{DatasetFormat, Grid, ReanalysisFrequency, SourceType};
use ocean_climo::climatology::{ClimatologyEngine, ClimoRequest, DepthSelector, TimePeriod};
use ocean_climo::config::{
    ClimoLocation, DateStrings, FormatLocation, ModelSourceConfig, Operation,
    ReanalysisSourceConfig, RunConfig,
};
use ocean_climo::data_source::{DataSource, SourceKind};
use ocean_climo::errors::{OceanClimoError, Result};
use ocean_climo::units::{ML_PER_L_TO_MMOL_PER_M3, MOLAR_CONCENTRATION};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::tempdir;

const MONTH_START: [f64; 13] = [
    0.0, 31.0, 59.0, 90.0, 120.0, 151.0, 181.0, 212.0, 243.0, 273.0, 304.0, 334.0, 365.0,
];

#[derive(Default)]
struct RecordingRenderer {
    maps: Vec<StateMap>,
}

impl MapRenderer for RecordingRenderer {
    fn render(&mut self, map: &StateMap) -> Result<()> {
        self.maps.push(map.clone());
        Ok(())
    }
}

fn add_pop_coordinates(file: &mut netcdf::FileMut) {
    let tlong = Array2::from_shape_fn((2, 4), |(_, i)| 90.0 * i as f64);
    let tlat = Array2::from_shape_fn((2, 4), |(j, _)| -30.0 + 60.0 * j as f64);
    let tarea = Array2::<f64>::ones((2, 4));
    for (name, data) in [("TLONG", tlong), ("TLAT", tlat), ("TAREA", tarea)] {
        let mut var = file
            .add_variable::<f64>(name, &["nlat", "nlon"])
            .expect("Failed to add coordinate");
        var.put(data.view(), ..).expect("Failed to write coordinate");
    }
}

/// One month of model history: NO3 = month + year + 100 * level
fn write_history_month(dir: &Path, year: usize, month: usize) {
    let path = dir.join(format!("g.test.pop.h.{:04}-{:02}.nc", year + 1, month + 1));
    let mut file = create(&path).expect("Failed to create NetCDF file");
    file.add_dimension("time", 1).expect("Failed to add dimension time");
    file.add_dimension("d2", 2).expect("Failed to add dimension d2");
    file.add_dimension("z_t", 3).expect("Failed to add dimension z_t");
    file.add_dimension("nlat", 2).expect("Failed to add dimension nlat");
    file.add_dimension("nlon", 4).expect("Failed to add dimension nlon");

    let offset = 365.0 * year as f64;
    let (start, end) = (offset + MONTH_START[month], offset + MONTH_START[month + 1]);

    let mut time = file
        .add_variable::<f64>("time", &["time"])
        .expect("Failed to add time");
    time.put_attribute("bounds", "time_bound")
        .expect("Failed to add bounds attribute");
    time.put_attribute("units", "days since 0001-01-01 00:00:00")
        .expect("Failed to add units");
    time.put_attribute("calendar", "noleap")
        .expect("Failed to add calendar");
    time.put(Array1::from(vec![end]).view(), ..)
        .expect("Failed to write time");

    let mut bounds = file
        .add_variable::<f64>("time_bound", &["time", "d2"])
        .expect("Failed to add time_bound");
    let bounds_data =
        Array2::from_shape_vec((1, 2), vec![start, end]).expect("Failed to shape bounds");
    bounds.put(bounds_data.view(), ..).expect("Failed to write bounds");

    let mut z_t = file
        .add_variable::<f64>("z_t", &["z_t"])
        .expect("Failed to add z_t");
    z_t.put_attribute("units", "centimeters")
        .expect("Failed to add units");
    z_t.put(Array1::from(vec![500.0, 1500.0, 10000.0]).view(), ..)
        .expect("Failed to write z_t");

    let no3 = Array4::from_shape_fn((1, 3, 2, 4), |(_, k, _, _)| {
        month as f64 + year as f64 + 100.0 * k as f64
    });
    let mut var = file
        .add_variable::<f64>("NO3", &["time", "z_t", "nlat", "nlon"])
        .expect("Failed to add NO3");
    var.put_attribute("units", "mmol/m^3")
        .expect("Failed to add units");
    var.put(no3.view(), ..).expect("Failed to write NO3");

    let mut temp = file
        .add_variable::<f64>("TEMP", &["time", "z_t", "nlat", "nlon"])
        .expect("Failed to add TEMP");
    temp.put(Array4::<f64>::zeros((1, 3, 2, 4)).view(), ..)
        .expect("Failed to write TEMP");

    add_pop_coordinates(&mut file);
}

fn write_history(dir: &Path) {
    std::fs::create_dir_all(dir).expect("Failed to create model directory");
    for year in 0..2 {
        for month in 0..12 {
            write_history_month(dir, year, month);
        }
    }
}

/// Reanalysis file on the POP grid: every variable is `scale * (level + 1)`
fn write_woa_file(path: &Path, names: &[&str], units: &str, scale: f64) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create grid directory");
    }
    let mut file = create(path).expect("Failed to create NetCDF file");
    file.add_dimension("time", 1).expect("Failed to add dimension time");
    file.add_dimension("depth", 3).expect("Failed to add dimension depth");
    file.add_dimension("nlat", 2).expect("Failed to add dimension nlat");
    file.add_dimension("nlon", 4).expect("Failed to add dimension nlon");

    let mut depth = file
        .add_variable::<f64>("depth", &["depth"])
        .expect("Failed to add depth");
    depth.put_attribute("units", "meters").expect("Failed to add units");
    depth
        .put(Array1::from(vec![5.0, 15.0, 100.0]).view(), ..)
        .expect("Failed to write depth");

    let analyzed = Array4::from_shape_fn((1, 3, 2, 4), |(_, k, _, _)| scale * (k + 1) as f64);
    for name in names {
        let mut var = file
            .add_variable::<f64>(name, &["time", "depth", "nlat", "nlon"])
            .expect("Failed to add reanalysis variable");
        var.put_attribute("units", units).expect("Failed to add units");
        var.put(analyzed.view(), ..).expect("Failed to write reanalysis variable");
    }

    add_pop_coordinates(&mut file);
}

/// Annual nitrate on the POP grid: n_an = 10 * (level + 1) umol/l
fn write_woa_nitrate(dirin: &Path) {
    write_woa_file(
        &dirin.join("POP_gx1v7").join("woa13_all_n00_gx1v7.nc"),
        &["n_an", "n_mn"],
        "micromoles_per_liter",
        10.0,
    );
}

/// Monthly nitrate on the POP grid: n_an = month * (level + 1) umol/l
fn write_woa_monthly_nitrate(dirin: &Path) {
    for month in 1..=12 {
        write_woa_file(
            &dirin
                .join("POP_gx1v7")
                .join(format!("woa13_all_n{month:02}_gx1v7.nc")),
            &["n_an", "n_mn"],
            "micromoles_per_liter",
            month as f64,
        );
    }
}

fn nitrate_request(depth: DepthSelector, period: TimePeriod) -> ClimoRequest<'static> {
    ClimoRequest {
        variable: "nitrate",
        depth,
        period,
        with_stats: true,
    }
}

#[test]
fn test_history_to_seasonal_maps() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let model_dir = temp_dir.path().join("model");
    write_history(&model_dir);

    let yaml = format!(
        r#"
short_name: bgc
dirout: {dirout}
grid: POP_gx1v7
operation: plot_mon_climo
variable_list: [nitrate]
depth_list: [100, [0, 20]]
data_sources:
  CESM:
    source: cesm
    case: g.test
    datestr: "000*"
    dataset_format:
      hist:
        dirin: {model}
        stream: pop.h
"#,
        dirout = temp_dir.path().join("out").display(),
        model = model_dir.display(),
    );
    let config = RunConfig::from_yaml_str(&yaml).expect("Failed to parse configuration");
    let analysis = Analysis::from_config(config).expect("Failed to open sources");

    let cesm = analysis.registry().get("CESM").expect("CESM not opened");
    assert_eq!(cesm.files().len(), 24);
    assert!(cesm.files()[0].ends_with("g.test.pop.h.0001-01.nc"));
    assert!(cesm.files()[23].ends_with("g.test.pop.h.0002-12.nc"));
    assert!(cesm.is_monthly_climatology());
    assert_eq!(cesm.dataset().time_len(), 12);
    assert!(!cesm.dataset().contains("TEMP"));
    let z_t = cesm.dataset().get("z_t").expect("z_t missing");
    assert!(approx_eq!(f64, z_t.data[[2]], 100.0, ulps = 2));
    assert_eq!(z_t.units(), Some("m"));

    let mut renderer = RecordingRenderer::default();
    let paths = analysis.run(&mut renderer).expect("Run failed");
    assert_eq!(paths.len(), 10);
    assert!(paths[0].ends_with("plots/state-map-bgc.nitrate.100m.ANN.png"));
    assert!(paths[1].ends_with("plots/state-map-bgc.nitrate.0-20m.ANN.png"));
    assert!(temp_dir.path().join("out").join("plots").is_dir());

    let value_of = |map: &StateMap| map.panels[0].field[[0, 0]];
    // monthly means are month + 0.5 + 100 * level
    assert!(approx_eq!(f64, value_of(&renderer.maps[0]), 206.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, value_of(&renderer.maps[1]), 56.0, epsilon = 1e-9));
    // DJF: (11.5 + 0.5 + 1.5) / 3 at 100 m
    assert_eq!(renderer.maps[2].period, TimePeriod::Djf);
    assert!(approx_eq!(f64, value_of(&renderer.maps[2]), 204.5, epsilon = 1e-9));

    let panel = &renderer.maps[0].panels[0];
    assert_eq!(panel.source_name, "CESM");
    // one cyclic column added by the POP adjustment
    assert_eq!(panel.field.dim(), (2, 5));
    let stats = panel.stats.expect("stats requested");
    assert!(approx_eq!(f64, stats.mean, 206.0, epsilon = 1e-9));
    assert_eq!(stats.rms, None);
    assert_eq!((renderer.maps[0].nrow, renderer.maps[0].ncol), (1, 1));
}

#[test]
fn test_reference_first_and_cache_reused() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let model_dir = temp_dir.path().join("model");
    let woa_dir = temp_dir.path().join("woa");
    let cache_dir = temp_dir.path().join("cache");
    write_history(&model_dir);
    write_woa_nitrate(&woa_dir);

    let yaml = format!(
        r#"
short_name: bgc
dirout: {dirout}
grid: POP_gx1v7
operation: plot_ann_climo
variable_list: [nitrate]
depth_list: [100]
reference: WOA2013
cache_data: true
cache_dir: {cache}
data_sources:
  CESM:
    source: cesm
    case: g.test
    datestr: "000*"
    dataset_format:
      hist:
        dirin: {model}
        stream: pop.h
  WOA2013:
    source: woa2013
    freq: ann
    ann_climo:
      dirin: {woa}
"#,
        dirout = temp_dir.path().join("out").display(),
        cache = cache_dir.display(),
        model = model_dir.display(),
        woa = woa_dir.display(),
    );
    let config = RunConfig::from_yaml_str(&yaml).expect("Failed to parse configuration");

    let analysis = Analysis::from_config(config.clone()).expect("Failed to open sources");
    let store = cache_dir.join("bgc.CESM.ann_climo.zarr");
    assert!(store.join(".zgroup").exists());
    assert!(cache_dir.join("bgc.CESM.ann_climo.json").exists());
    // reanalysis is never averaged, so never cached
    assert!(!cache_dir.join("bgc.WOA2013.ann_climo.zarr").exists());
    assert_eq!(analysis.registry().ordered_names(), vec!["WOA2013", "CESM"]);

    let mut renderer = RecordingRenderer::default();
    analysis.run(&mut renderer).expect("Run failed");
    assert_eq!(renderer.maps.len(), 1);
    let panels = &renderer.maps[0].panels;
    assert_eq!(panels[0].source_name, "WOA2013");
    assert!(approx_eq!(f64, panels[0].field[[1, 1]], 30.0, epsilon = 1e-9));
    assert!(approx_eq!(f64, panels[1].field[[1, 1]], 206.0, epsilon = 1e-9));
    assert_eq!((renderer.maps[0].nrow, renderer.maps[0].ncol), (2, 1));

    // second run picks up the cached climatology
    let rerun = Analysis::from_config(config).expect("Failed to reopen sources");
    let cesm = rerun.registry().get("CESM").expect("CESM not opened");
    assert!(matches!(cesm.kind(), SourceKind::CachedClimo { .. }));
    assert_eq!(cesm.time_periods().len(), 1);

    let mut renderer = RecordingRenderer::default();
    rerun.run(&mut renderer).expect("Rerun failed");
    let panels = &renderer.maps[0].panels;
    assert!(approx_eq!(f64, panels[1].field[[1, 1]], 206.0, epsilon = 1e-9));
    // depth was converted once, before caching
    let z_t = cesm.dataset().get("z_t").expect("z_t missing");
    assert!(approx_eq!(f64, z_t.data[[2]], 100.0, ulps = 2));
}

fn open_reanalysis(
    freq: ReanalysisFrequency,
    dirin: &Path,
    filename: Option<&str>,
    variable: &str,
) -> Result<DataSource> {
    let location = ClimoLocation {
        dirin: dirin.to_path_buf(),
        filename: filename.map(str::to_string),
    };
    let (ann_climo, mon_climo) = match freq {
        ReanalysisFrequency::Mon => (None, Some(location)),
        _ => (Some(location), None),
    };
    let config = ReanalysisSourceConfig {
        freq,
        grid: None,
        ann_climo,
        mon_climo,
    };
    DataSource::reanalysis(
        "WOA2013",
        SourceType::Woa2013,
        &config,
        Grid::PopGx1v7,
        &[variable.to_string()],
    )
}

fn open_woa(dirin: &Path) -> DataSource {
    open_reanalysis(ReanalysisFrequency::Ann, dirin, None, "nitrate")
        .expect("Failed to open reanalysis")
}

#[test]
fn test_reanalysis_normalized_on_open() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_woa_nitrate(temp_dir.path());
    let mut woa = open_woa(temp_dir.path());

    assert!(woa.is_annual_climatology());
    assert!(woa.units_conformed());
    assert_eq!(woa.files().len(), 1);
    assert!(woa.files()[0].ends_with("POP_gx1v7/woa13_all_n00_gx1v7.nc"));

    let ds = woa.dataset();
    assert!(ds.contains("NO3"));
    assert!(!ds.contains("n_an"));
    assert!(!ds.contains("n_mn"));
    assert!(ds.contains("z_t"));
    assert!(!ds.contains("depth"));
    let no3 = ds.get("NO3").expect("NO3 missing");
    assert_eq!(no3.dims, vec!["time", "z_t", "nlat", "nlon"]);
    assert_eq!(no3.units(), Some(MOLAR_CONCENTRATION));
    assert_eq!(no3.attr_str("long_name"), Some("Nitrate"));
    assert_eq!(no3.data[[0, 0, 0, 0]], 10.0);

    let err = woa.conform_units().unwrap_err();
    assert!(matches!(err, OceanClimoError::UnitsAlreadyConformed { .. }));
    assert_eq!(woa.dataset().get("NO3").expect("NO3 missing").data[[0, 0, 0, 0]], 10.0);
}

#[test]
fn test_annual_source_offers_only_ann() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_woa_nitrate(temp_dir.path());
    let woa = open_woa(temp_dir.path());
    let engine = ClimatologyEngine::new(Grid::PopGx1v7);

    let err = engine
        .compute(&woa, &nitrate_request(DepthSelector::Level(100.0), TimePeriod::Djf))
        .unwrap_err();
    match &err {
        OceanClimoError::InvalidTimePeriod {
            source_name,
            period,
        } => {
            assert_eq!(source_name, "WOA2013");
            assert_eq!(period, "DJF");
        }
        other => panic!("Expected InvalidTimePeriod, got {other:?}"),
    }
    assert!(err.is_lookup_error());

    let range = engine
        .compute(&woa, &nitrate_request(DepthSelector::Range([0.0, 20.0]), TimePeriod::Ann))
        .expect("Range request failed");
    assert_eq!(range.field.dim(), (2, 4));
    assert!(range.field.iter().all(|v| approx_eq!(f64, *v, 15.0, epsilon = 1e-9)));

    let empty = engine
        .compute(&woa, &nitrate_request(DepthSelector::Range([20.0, 50.0]), TimePeriod::Ann))
        .unwrap_err();
    assert!(matches!(empty, OceanClimoError::EmptyDepthRange { .. }));

    let unknown = engine
        .compute(
            &woa,
            &ClimoRequest {
                variable: "iron",
                ..nitrate_request(DepthSelector::Level(0.0), TimePeriod::Ann)
            },
        )
        .unwrap_err();
    assert!(matches!(unknown, OceanClimoError::VariableNotInDictionary { .. }));
}

#[test]
fn test_missing_model_files_name_the_pattern() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let yaml = format!(
        r#"
short_name: bgc
dirout: {dirout}
grid: POP_gx1v7
operation: plot_ann_climo
variable_list: [nitrate]
depth_list: [0]
data_sources:
  CESM:
    source: cesm
    case: g.missing
    datestr: ["0001-01", "0001-02"]
    dataset_format:
      mon_climo:
        dirin: {model}
        stream: pop.h
"#,
        dirout = temp_dir.path().display(),
        model = temp_dir.path().display(),
    );
    let config = RunConfig::from_yaml_str(&yaml).expect("Failed to parse configuration");
    let err = Analysis::from_config(config).unwrap_err();
    match err {
        OceanClimoError::NoFilesFound { patterns } => {
            assert_eq!(patterns.len(), 2);
            assert!(patterns[0].ends_with("pop.h.0001-01.nc"));
        }
        other => panic!("Expected NoFilesFound, got {other:?}"),
    }
}

#[test]
fn test_monthly_cache_with_annual_period() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let model_dir = temp_dir.path().join("model");
    let cache_dir = temp_dir.path().join("cache");
    write_history(&model_dir);

    let yaml = format!(
        r#"
short_name: bgc
dirout: {dirout}
grid: POP_gx1v7
operation: plot_mon_climo
variable_list: [nitrate]
depth_list: [100]
cache_data: true
cache_dir: {cache}
climo_time_periods: [ANN]
data_sources:
  CESM:
    source: cesm
    case: g.test
    datestr: "000*"
    dataset_format:
      hist:
        dirin: {model}
        stream: pop.h
"#,
        dirout = temp_dir.path().join("out").display(),
        cache = cache_dir.display(),
        model = model_dir.display(),
    );

    let seasonal = yaml.replace("climo_time_periods: [ANN]\n", "");
    let err = RunConfig::from_yaml_str(&seasonal).unwrap_err();
    assert!(err.is_configuration_error());
    assert!(err.to_string().contains("DJF"));

    let config = RunConfig::from_yaml_str(&yaml).expect("Failed to parse configuration");
    let analysis = Analysis::from_config(config.clone()).expect("Failed to open sources");
    assert!(cache_dir.join("bgc.CESM.mon_climo.zarr").join(".zgroup").exists());
    let mut renderer = RecordingRenderer::default();
    analysis.run(&mut renderer).expect("Run failed");
    assert_eq!(renderer.maps.len(), 1);
    assert!(approx_eq!(f64, renderer.maps[0].panels[0].field[[0, 0]], 206.0, epsilon = 1e-9));

    let rerun = Analysis::from_config(config).expect("Failed to reopen sources");
    let cesm = rerun.registry().get("CESM").expect("CESM not opened");
    assert!(matches!(cesm.kind(), SourceKind::CachedClimo { .. }));
    let mut renderer = RecordingRenderer::default();
    rerun.run(&mut renderer).expect("Rerun failed");
    assert_eq!(renderer.maps.len(), 1);
    assert_eq!(renderer.maps[0].period, TimePeriod::Ann);
    assert!(approx_eq!(f64, renderer.maps[0].panels[0].field[[0, 0]], 206.0, epsilon = 1e-9));
}

#[test]
fn test_monthly_reanalysis_seasons() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_woa_monthly_nitrate(temp_dir.path());
    let woa = open_reanalysis(ReanalysisFrequency::Mon, temp_dir.path(), None, "nitrate")
        .expect("Failed to open monthly reanalysis");

    assert!(woa.is_monthly_climatology());
    assert_eq!(woa.files().len(), 12);
    assert!(woa.files()[0].ends_with("POP_gx1v7/woa13_all_n01_gx1v7.nc"));
    assert!(woa.files()[11].ends_with("POP_gx1v7/woa13_all_n12_gx1v7.nc"));
    assert_eq!(woa.dataset().time_len(), 12);
    assert_eq!(woa.time_periods().len(), 5);

    // March, April and May hold 3, 4 and 5 at the surface
    let spring = ClimatologyEngine::new(Grid::PopGx1v7)
        .compute(&woa, &nitrate_request(DepthSelector::Level(0.0), TimePeriod::Mam))
        .expect("MAM request failed");
    assert!(spring.field.iter().all(|v| approx_eq!(f64, *v, 4.0, epsilon = 1e-9)));
}

#[test]
fn test_monthly_reanalysis_missing_month() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_woa_monthly_nitrate(temp_dir.path());
    let march = temp_dir
        .path()
        .join("POP_gx1v7")
        .join("woa13_all_n03_gx1v7.nc");
    std::fs::remove_file(&march).expect("Failed to remove March");

    let err = open_reanalysis(ReanalysisFrequency::Mon, temp_dir.path(), None, "nitrate")
        .unwrap_err();
    match err {
        OceanClimoError::NoFilesFound { patterns } => {
            assert_eq!(patterns, vec![march.display().to_string()]);
        }
        other => panic!("Expected NoFilesFound, got {other:?}"),
    }
}

#[test]
fn test_reanalysis_explicit_filename() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_woa_file(
        &temp_dir.path().join("woa_combined.nc"),
        &["NO3"],
        "micromoles_per_liter",
        10.0,
    );

    let woa = open_reanalysis(
        ReanalysisFrequency::Ann,
        temp_dir.path(),
        Some("woa_combined.nc"),
        "nitrate",
    )
    .expect("Failed to open reanalysis");
    assert_eq!(woa.files().len(), 1);
    assert!(woa.files()[0].ends_with("woa_combined.nc"));

    let ds = woa.dataset();
    assert!(ds.contains("z_t"));
    assert!(!ds.contains("depth"));
    let no3 = ds.get("NO3").expect("NO3 missing");
    assert_eq!(no3.dims, vec!["time", "z_t", "nlat", "nlon"]);
    assert_eq!(no3.units(), Some(MOLAR_CONCENTRATION));
    assert_eq!(no3.data[[0, 2, 1, 3]], 30.0);

    let err = open_reanalysis(
        ReanalysisFrequency::Ann,
        temp_dir.path(),
        Some("absent.nc"),
        "nitrate",
    )
    .unwrap_err();
    match err {
        OceanClimoError::NoFilesFound { patterns } => {
            assert_eq!(patterns.len(), 1);
            assert!(patterns[0].ends_with("absent.nc"));
        }
        other => panic!("Expected NoFilesFound, got {other:?}"),
    }
}

#[test]
fn test_reanalysis_oxygen_converted_from_ml_per_l() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_woa_file(
        &temp_dir.path().join("POP_gx1v7").join("woa13_all_o00_gx1v7.nc"),
        &["o_an", "o_mn"],
        "ml l-1",
        1.0,
    );

    let woa = open_reanalysis(ReanalysisFrequency::Ann, temp_dir.path(), None, "oxygen")
        .expect("Failed to open reanalysis");
    assert!(woa.files()[0].ends_with("POP_gx1v7/woa13_all_o00_gx1v7.nc"));

    let ds = woa.dataset();
    assert!(!ds.contains("o_an"));
    assert!(!ds.contains("o_mn"));
    let o2 = ds.get("O2").expect("O2 missing");
    assert_eq!(o2.units(), Some(MOLAR_CONCENTRATION));
    assert!(approx_eq!(f64, o2.data[[0, 0, 0, 0]], ML_PER_L_TO_MMOL_PER_M3, epsilon = 1e-9));
    assert!(approx_eq!(f64, o2.data[[0, 2, 0, 0]], 3.0 * 1.0e6 / 1.0e3 / 22.3916, epsilon = 1e-9));
}

/// One month of a single-variable time series file, depth in centimetres
fn write_single_variable(dir: &Path, var: &str, value: f64, depths: [f64; 3]) {
    std::fs::create_dir_all(dir).expect("Failed to create model directory");
    let path = dir.join(format!("g.test.pop.h.{var}.0001-01.nc"));
    let mut file = create(&path).expect("Failed to create NetCDF file");
    file.add_dimension("time", 1).expect("Failed to add dimension time");
    file.add_dimension("d2", 2).expect("Failed to add dimension d2");
    file.add_dimension("z_t", 3).expect("Failed to add dimension z_t");
    file.add_dimension("nlat", 2).expect("Failed to add dimension nlat");
    file.add_dimension("nlon", 4).expect("Failed to add dimension nlon");

    let mut time = file
        .add_variable::<f64>("time", &["time"])
        .expect("Failed to add time");
    time.put_attribute("bounds", "time_bound")
        .expect("Failed to add bounds attribute");
    time.put(Array1::from(vec![31.0]).view(), ..)
        .expect("Failed to write time");
    let mut bounds = file
        .add_variable::<f64>("time_bound", &["time", "d2"])
        .expect("Failed to add time_bound");
    let bounds_data =
        Array2::from_shape_vec((1, 2), vec![0.0, 31.0]).expect("Failed to shape bounds");
    bounds.put(bounds_data.view(), ..).expect("Failed to write bounds");

    let mut z_t = file
        .add_variable::<f64>("z_t", &["z_t"])
        .expect("Failed to add z_t");
    z_t.put_attribute("units", "centimeters")
        .expect("Failed to add units");
    z_t.put(Array1::from(depths.to_vec()).view(), ..)
        .expect("Failed to write z_t");

    let mut data = file
        .add_variable::<f64>(var, &["time", "z_t", "nlat", "nlon"])
        .expect("Failed to add variable");
    data.put(Array4::from_elem((1, 3, 2, 4), value).view(), ..)
        .expect("Failed to write variable");

    add_pop_coordinates(&mut file);
}

fn single_variable_config(dirin: &Path) -> ModelSourceConfig {
    ModelSourceConfig {
        case: "g.test".to_string(),
        datestr: DateStrings::One("0001-01".to_string()),
        dataset_format: BTreeMap::from([(
            DatasetFormat::SingleVariable,
            FormatLocation {
                dirin: dirin.to_path_buf(),
                stream: "pop.h".to_string(),
            },
        )]),
    }
}

#[test]
fn test_single_variable_files_merged() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let depths = [500.0, 1500.0, 10000.0];
    write_single_variable(temp_dir.path(), "NO3", 1.0, depths);
    write_single_variable(temp_dir.path(), "PO4", 2.0, depths);

    let variables = vec!["nitrate".to_string(), "phosphate".to_string()];
    let cesm = DataSource::model(
        "CESM",
        &single_variable_config(temp_dir.path()),
        Operation::PlotAnnClimo,
        &variables,
    )
    .expect("Failed to open single-variable output");

    assert!(matches!(
        cesm.kind(),
        SourceKind::ModelHistory {
            format: DatasetFormat::SingleVariable
        }
    ));
    assert_eq!(cesm.files().len(), 2);
    assert!(cesm.files()[0].ends_with("g.test.pop.h.NO3.0001-01.nc"));
    assert!(cesm.files()[1].ends_with("g.test.pop.h.PO4.0001-01.nc"));

    let ds = cesm.dataset();
    assert_eq!(ds.get("NO3").expect("NO3 missing").data[[0, 0, 0, 0]], 1.0);
    assert_eq!(ds.get("PO4").expect("PO4 missing").data[[0, 0, 0, 0]], 2.0);
    assert!(ds.contains("TAREA"));
    let z_t = ds.get("z_t").expect("z_t missing");
    assert!(approx_eq!(f64, z_t.data[[0]], 5.0, ulps = 2));
}

#[test]
fn test_single_variable_conflicting_files() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    write_single_variable(temp_dir.path(), "NO3", 1.0, [500.0, 1500.0, 10000.0]);
    write_single_variable(temp_dir.path(), "PO4", 2.0, [500.0, 2500.0, 10000.0]);

    let variables = vec!["nitrate".to_string(), "phosphate".to_string()];
    let err = DataSource::model(
        "CESM",
        &single_variable_config(temp_dir.path()),
        Operation::PlotAnnClimo,
        &variables,
    )
    .unwrap_err();
    match err {
        OceanClimoError::Merge { message } => assert!(message.contains("'z_t'")),
        other => panic!("Expected Merge, got {other:?}"),
    }
}
