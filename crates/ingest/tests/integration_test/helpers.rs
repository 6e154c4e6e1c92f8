use std::fs;
use std::path::Path;

use aquaguard_core::DataConfig;

pub const PRESSURES: &str = "\
Timestamp;n1;n2;n3
01/01/2019 00:00;50,0;48,0;47,0
01/01/2019 00:05;50,1;48,2;
01/01/2019 00:10;49,9;47,9;46,8
02/01/2019 00:00;50,0;48,1;46,9
";

pub const FLOWS: &str = "\
Timestamp;PUMP_1
01/01/2019 00:00;100,0
01/01/2019 00:05;101,0
01/01/2019 00:10;99,5
02/01/2019 00:00;100,2
";

pub const NETWORK: &str = "\
[JUNCTIONS]
 n1 10 0
 n2 10 0
 n3 10 0
 j4 10 0
[PIPES]
 p1 n1 n2 100 200 110 0 Open
 p2 n2 j4 60  200 110 0 Open
 p3 j4 n3 60  200 110 0 Open
[COORDINATES]
 n1 0   0
 n2 100 0
 n3 200 0
 j4 150 0
[END]
";

pub const LEAKAGES: &str = "\
Timestamp;p1;p3
01/01/2019 00:00;0;
01/01/2019 00:05;0;1,5
01/01/2019 00:10;0;1,5
02/01/2019 00:00;0;1,5
";

/// Write a data directory with pressures, flows, a network model and
/// ground truth, returning a config pointing at it.
pub fn data_dir(root: &Path) -> DataConfig {
    fs::write(root.join("Pressures.csv"), PRESSURES).unwrap();
    fs::write(root.join("Flows.csv"), FLOWS).unwrap();
    fs::write(root.join("network.inp"), NETWORK).unwrap();
    fs::write(root.join("Leakages.csv"), LEAKAGES).unwrap();
    DataConfig {
        data_dir: root.to_path_buf(),
        inp_file: Some("network.inp".into()),
        ground_truth_file: Some("Leakages.csv".into()),
        ..Default::default()
    }
}
