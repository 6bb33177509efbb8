// Integration tests for hypo-link

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hypo_link::commands::{mk_pha, relocate, select_dt, SelectOptions};
use hypo_link::models::PartitionTask;
use hypo_link::services::RelocationSolver;
use hypo_link::{LinkError, Result, Settings};

const CATALOG: &str = "\
2019-07-05T01:00:00.000000Z,35.7,-117.6,8,2,101
CI.CLC,2019-07-05T01:00:03.100000Z,2019-07-05T01:00:05.200000Z
CI.SLA,2019-07-05T01:00:06.000000Z,-1
2019-07-05T02:00:00.000000Z,35.71,-117.61,8.5,1.8,102
CI.CLC,2019-07-05T02:00:03.000000Z,2019-07-05T02:00:05.100000Z
2019-07-06T03:00:00.000000Z,35.72,-117.4,6,2.2,103
CI.WRC2,2019-07-06T03:00:04.000000Z,-1
2019-07-06T04:00:00.000000Z,35.73,-117.41,6.2,1.1,104
CI.CLC,2019-07-06T04:00:03.500000Z,-1
2019-07-12T04:00:00.000000Z,35.73,-117.41,6.2,1.1,105
CI.CLC,2019-07-12T04:00:03.500000Z,-1
2019-07-06T04:00:00.000000Z,37.0,-117.41,6.2,1.1,106
CI.CLC,2019-07-06T04:00:03.500000Z,-1
";

const STATIONS: &str = "\
CI.CLC,35.816,-117.597,0.775
CI.SLA,35.891,-117.283,1.174,1e9
CI.WRC2,35.948,-117.650,0.943,1e9,1.1e9,0.9e9
";

const DT_ALL: &str = "\
# 101 102 0.0
CI.CLC 0.05 0.9 P
CI.SLA -0.10 0.8 S
CI.SLA 0.90 0.8 P
# 103 104 0.0
CI.CLC 0.02 0.95 P
CI.WRC2 0.03 0.85 P
# 101 105 0.0
CI.CLC 0.01 0.9 P
# 102 103 0.0
CI.CLC 0.01 0.9 P
";

const TEMPLATE: &str = "\
* hypoDD control file
dt.cc
dt.ct
event.dat
station.dat
hypoDD.loc
hypoDD.reloc
";

fn create_workspace(dir: &Path) -> Settings {
    fs::write(dir.join("catalog.pha"), CATALOG).unwrap();
    fs::write(dir.join("station.csv"), STATIONS).unwrap();
    fs::write(dir.join("dt_all.cc"), DT_ALL).unwrap();
    fs::write(dir.join("hypoDD.inp"), TEMPLATE).unwrap();

    let text = format!(
        r#"
[paths]
hypo_root = "{root}"
ctlg_code = "eg"
station_file = "{root}/station.csv"
catalog_file = "{root}/catalog.pha"
working_catalog = "{root}/input/phase.temp"
dt_input = "{root}/dt_all.cc"
dt_output = "{root}/input/dt.cc"
hypodd_template = "{root}/hypoDD.inp"
input_dir = "{root}/input"
output_dir = "{root}/output"

[linkage.select]
cc = 0.3
loc_dev_km = 3.0
dep_dev_km = 4.0
dist_km = 80.0
dt_p = 0.5
dt_s = 0.8
min_sta = 2

[relocation]
time_window = "20190704-20190710"
lat_range = [35.45, 36.05]
lon_range = [-117.8, -117.25]
num_grids = [2, 1]
xy_pad = [0.045, 0.036]
dep_corr = 5.0
num_workers = 2
"#,
        root = dir.display()
    );
    Settings::from_toml_str(&text).unwrap()
}

fn select_options() -> SelectOptions {
    SelectOptions {
        profile: "select".to_string(),
        input: None,
        output: None,
    }
}

/// Hands every event of the partition back unchanged, in event-file order
struct EchoSolver;

impl RelocationSolver for EchoSolver {
    fn relocate(&self, task: &PartitionTask) -> Result<PathBuf> {
        let input = fs::read_to_string(&task.paths.event_file).unwrap();
        let rows: Vec<String> = input
            .lines()
            .map(|l| {
                let f: Vec<&str> = l.split_whitespace().collect();
                let (date, time) = (f[0], f[1]);
                format!(
                    "{} {} {} {} 0 0 0 0 0 0 {} {} {} {} {} {}.{}",
                    f[9],
                    f[2],
                    f[3],
                    f[4],
                    &date[0..4],
                    &date[4..6],
                    &date[6..8],
                    &time[0..2],
                    &time[2..4],
                    &time[4..6],
                    &time[6..8]
                )
            })
            .collect();
        fs::write(&task.paths.reloc_file, rows.join("\n")).unwrap();
        Ok(task.paths.reloc_file.clone())
    }
}

/// Runs but never produces a usable row
struct SilentSolver;

impl RelocationSolver for SilentSolver {
    fn relocate(&self, task: &PartitionTask) -> Result<PathBuf> {
        fs::write(&task.paths.reloc_file, "").unwrap();
        Ok(task.paths.reloc_file.clone())
    }
}

#[test]
fn test_integration_mk_pha_restricts_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let settings = create_workspace(dir.path());

    let written = mk_pha(&settings).unwrap();
    assert_eq!(written, 4);

    let working = fs::read_to_string(&settings.paths.working_catalog).unwrap();
    let expected: String = CATALOG.lines().take(9).map(|l| format!("{}\n", l)).collect();
    assert_eq!(working, expected);
}

#[test]
fn test_integration_select_dt_filters_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let settings = create_workspace(dir.path());
    mk_pha(&settings).unwrap();

    let stats = select_dt(&settings, &select_options()).unwrap();

    assert_eq!(stats.pairs_read, 4);
    assert_eq!(stats.pairs_kept, 2);
    assert_eq!(stats.pairs_missing_event, 1);
    assert_eq!(stats.pairs_location_rejected, 1);
    assert_eq!(stats.obs_dt_rejected, 1);
    assert_eq!(stats.obs_kept, 4);

    let selected = fs::read_to_string(&settings.paths.dt_output).unwrap();
    assert_eq!(
        selected,
        "# 101 102 0.0\nCI.CLC 0.05 0.9 P\nCI.SLA -0.10 0.8 S\n# 103 104 0.0\nCI.CLC 0.02 0.95 P\nCI.WRC2 0.03 0.85 P\n"
    );
}

#[test]
fn test_integration_select_dt_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let settings = create_workspace(dir.path());
    mk_pha(&settings).unwrap();

    let first_path = dir.path().join("first.cc");
    let second_path = dir.path().join("second.cc");
    for path in [&first_path, &second_path] {
        let options = SelectOptions {
            output: Some(path.clone()),
            ..select_options()
        };
        select_dt(&settings, &options).unwrap();
    }

    assert_eq!(fs::read(first_path).unwrap(), fs::read(second_path).unwrap());
}

#[test]
fn test_integration_unknown_profile_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let settings = create_workspace(dir.path());
    mk_pha(&settings).unwrap();

    let options = SelectOptions {
        profile: "initial".to_string(),
        ..select_options()
    };
    let err = select_dt(&settings, &options).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_integration_relocate_round_trips_working_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let settings = create_workspace(dir.path());
    mk_pha(&settings).unwrap();
    select_dt(&settings, &select_options()).unwrap();

    let report = tokio_test::block_on(relocate(&settings, Arc::new(EchoSolver))).unwrap();

    assert_eq!(report.total_relocated, 4);
    assert_eq!(report.failed_partitions, 0);
    assert_eq!(report.partitions.len(), 2);
    assert_eq!(report.partitions[0].pairs, 1);

    // depth goes out with +dep_corr and comes back with -dep_corr
    let output = dir.path().join("output");
    let working = fs::read_to_string(&settings.paths.working_catalog).unwrap();
    let full = fs::read_to_string(output.join("eg_full.pha")).unwrap();
    assert_eq!(full, working);

    let ctlg = fs::read_to_string(output.join("eg.ctlg")).unwrap();
    assert_eq!(ctlg.lines().count(), 4);
    assert!(ctlg.starts_with("2019-07-05T01:00:00.000000Z,35.7,-117.6,8,2\n"));

    let pha = fs::read_to_string(output.join("eg.pha")).unwrap();
    assert_eq!(pha.lines().count(), 9);

    let json = fs::read_to_string(output.join("eg_report.json")).unwrap();
    assert!(json.contains("\"totalRelocated\": 4"));

    assert!(!dir.path().join("input/event_0-0.dat").exists());
    assert!(!output.join("eg_1-0.ctlg").exists());
}

#[test]
fn test_integration_relocate_without_results_is_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let settings = create_workspace(dir.path());
    mk_pha(&settings).unwrap();
    select_dt(&settings, &select_options()).unwrap();

    let err = tokio_test::block_on(relocate(&settings, Arc::new(SilentSolver))).unwrap_err();

    assert!(matches!(err, LinkError::NoOutput));
    assert!(err.is_fatal());
    assert!(dir.path().join("output/eg_report.json").exists());
}
