//! End-to-end: text graph -> structure file -> query manager

use std::path::{Path, PathBuf};

use butterfly_distance::ch::{build_ch, Provenance};
use butterfly_distance::dijkstra::shortest_distance;
use butterfly_distance::formats::{ChFile, IdMapFile, TnrFile, TnrafFile};
use butterfly_distance::loaders::{load_graph, GraphFormat, LoadedGraph};
use butterfly_distance::tnr::{build_tnr, TnrConfig, TnrMode};
use butterfly_distance::tnraf::{build_tnraf, TnrafConfig};
use butterfly_distance::{ChConfig, Distance, DistanceMatrix, DistanceQueryManager, Error, ManagerState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// Small DIMACS road-like graph: 1-based ids, asymmetric weights
const DIMACS: &str = "c test graph
p sp 6 9
a 1 2 7
a 2 1 9
a 2 3 4
a 3 4 3
a 4 5 8
a 5 6 2
a 6 1 11
a 1 4 20
a 3 6 15
";

fn tnr_config() -> TnrConfig {
    TnrConfig {
        transit_count: 2,
        mode: TnrMode::Slow,
    }
}

fn write_text(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// Build all three structures from `graph` and return their paths
fn write_all<W: butterfly_distance::Weight>(dir: &TempDir, loaded: &LoadedGraph<W>) -> [PathBuf; 3] {
    let (ch, _) = build_ch(&loaded.graph, &ChConfig::default(), Provenance::default()).unwrap();
    let ch_path = dir.path().join("g.bdch");
    ChFile::write(&ch_path, &ch).unwrap();

    let (tnr, _) = build_tnr(ch.clone(), &tnr_config()).unwrap();
    let tnr_path = dir.path().join("g.bdtn");
    TnrFile::write(&tnr_path, &tnr).unwrap();

    let config = TnrafConfig {
        tnr: tnr_config(),
        region_count: 3,
    };
    let (flags, _) = build_tnraf(&loaded.graph, tnr, &config).unwrap();
    let tnraf_path = dir.path().join("g.bdta");
    TnrafFile::write(&tnraf_path, &flags).unwrap();

    [ch_path, tnr_path, tnraf_path]
}

fn manager_for(structure: &Path, mapping: Option<&Path>) -> DistanceQueryManager {
    let manager = DistanceQueryManager::new();
    manager.initialize(structure, mapping).unwrap();
    manager
}

#[test]
fn dimacs_pipeline_answers_external_ids() {
    let dir = TempDir::new().unwrap();
    let input = write_text(&dir, "g.gr", DIMACS);
    let loaded = load_graph::<u32, _>(&input, GraphFormat::Dimacs, 1).unwrap();
    assert_eq!(loaded.external_ids, vec![1, 2, 3, 4, 5, 6]);
    let mapping = dir.path().join("g.bdim");
    IdMapFile::write(&mapping, &loaded.external_ids).unwrap();

    for structure in write_all(&dir, &loaded) {
        let manager = manager_for(&structure, Some(mapping.as_path()));
        assert!(manager.has_mapping());
        // 1 -> 2 -> 3 -> 4 beats the direct arc of 20
        assert_eq!(manager.distance_query_mapped(1, 4).unwrap(), Distance::Integer(14));
        assert_eq!(manager.distance_query(0, 3).unwrap(), Distance::Integer(14));
        assert_eq!(manager.distance_query_mapped(6, 6).unwrap(), Distance::Integer(0));
        // internal 0 is external 1; 0 is not a DIMACS id
        assert!(matches!(
            manager.distance_query_mapped(0, 1),
            Err(Error::UnknownIdentifier(0))
        ));
        assert!(matches!(manager.distance_query(6, 0), Err(Error::UnknownIdentifier(6))));

        for s in 0..6u32 {
            for t in 0..6u32 {
                let expected = shortest_distance(&loaded.graph, s, t);
                assert_eq!(manager.distance_query(s, t).unwrap(), Distance::Integer(expected));
            }
        }
        manager.clear_structures();
        assert_eq!(manager.state(), ManagerState::Released);
    }
}

#[test]
fn xengraph_with_xid_index() {
    let dir = TempDir::new().unwrap();
    // 0 -> 1 oneway, 1 <-> 2, 3 has no edges
    let input = write_text(&dir, "g.xeng", "XGI\n4 2\n0 1 10 1\n1 2 5 0\n");
    let index = write_text(&dir, "g.xid", "XID\n4\n9001\n9002\n9003\n9004\n");
    let loaded = load_graph::<u32, _>(&input, GraphFormat::Xengraph, 1).unwrap();
    let [ch_path, _, tnraf_path] = write_all(&dir, &loaded);

    for structure in [ch_path, tnraf_path] {
        let manager = manager_for(&structure, Some(index.as_path()));
        assert_eq!(manager.distance_query_mapped(9001, 9003).unwrap(), Distance::Integer(15));
        assert_eq!(manager.distance_query_mapped(9003, 9002).unwrap(), Distance::Integer(5));
        let back = manager.distance_query_mapped(9002, 9001).unwrap();
        assert!(back.is_unreachable());
        assert_eq!(back.to_string(), "unreachable");
        assert!(manager.distance_query_mapped(9001, 9004).unwrap().is_unreachable());
    }
}

#[test]
fn real_domain_structures_keep_fractions() {
    let dir = TempDir::new().unwrap();
    let input = write_text(&dir, "g.gr", "p sp 3 3\na 1 2 0.25\na 2 3 1.5\na 1 3 2.0\n");
    let loaded = load_graph::<f64, _>(&input, GraphFormat::Dimacs, 1).unwrap();

    for structure in write_all(&dir, &loaded) {
        let manager = manager_for(&structure, None);
        assert_eq!(manager.info().unwrap().domain, butterfly_distance::NumericDomain::Real);
        assert_eq!(manager.distance_query(0, 2).unwrap(), Distance::Real(1.75));
        assert_eq!(manager.distance_query(2, 0).unwrap(), Distance::Real(f64::INFINITY));
    }
}

#[test]
fn precision_loss_scales_integer_weights() {
    let dir = TempDir::new().unwrap();
    let input = write_text(&dir, "g.gr", "p sp 3 2\na 1 2 1000\na 2 3 2500\n");
    let loaded = load_graph::<u32, _>(&input, GraphFormat::Dimacs, 10).unwrap();
    let [ch_path, _, _] = write_all(&dir, &loaded);
    let manager = manager_for(&ch_path, None);
    assert_eq!(manager.distance_query(0, 2).unwrap(), Distance::Integer(350));
}

#[test]
fn damaged_files_fail_with_load_error() {
    let dir = TempDir::new().unwrap();
    let input = write_text(&dir, "g.gr", DIMACS);
    let loaded = load_graph::<u32, _>(&input, GraphFormat::Dimacs, 1).unwrap();

    for structure in write_all(&dir, &loaded) {
        let bytes = std::fs::read(&structure).unwrap();

        let truncated = dir.path().join("truncated");
        std::fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();
        let manager = DistanceQueryManager::new();
        assert!(matches!(manager.initialize(&truncated, None), Err(Error::LoadError(_))));
        assert_eq!(manager.state(), ManagerState::Unloaded);

        let mut flipped = bytes.clone();
        let middle = flipped.len() / 2;
        flipped[middle] ^= 0x40;
        let corrupted = dir.path().join("corrupted");
        std::fs::write(&corrupted, &flipped).unwrap();
        assert!(matches!(manager.initialize(&corrupted, None), Err(Error::LoadError(_))));

        // the graph text itself is not a structure
        assert!(matches!(manager.initialize(&input, None), Err(Error::LoadError(_))));

        // a valid structure still loads afterwards
        manager.initialize(&structure, None).unwrap();
        assert_eq!(manager.state(), ManagerState::Loaded);
    }
}

#[test]
fn mapping_size_must_match_structure() {
    let dir = TempDir::new().unwrap();
    let input = write_text(&dir, "g.gr", DIMACS);
    let loaded = load_graph::<u32, _>(&input, GraphFormat::Dimacs, 1).unwrap();
    let [ch_path, _, _] = write_all(&dir, &loaded);
    let short = write_text(&dir, "short.xid", "XID\n2\n1\n2\n");

    let manager = DistanceQueryManager::new();
    assert!(matches!(
        manager.initialize(&ch_path, Some(short.as_path())),
        Err(Error::LoadError(_))
    ));
    assert_eq!(manager.state(), ManagerState::Unloaded);
}

#[test]
fn concurrent_queries_share_one_manager() {
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(31);
    let n = 150u32;
    let mut text = format!("p sp {} {}\n", n, n * 3);
    for v in 1..=n {
        text.push_str(&format!("a {} {} {}\n", v, v % n + 1, rng.random_range(1..30)));
        for _ in 0..2 {
            text.push_str(&format!(
                "a {} {} {}\n",
                v,
                rng.random_range(1..=n),
                rng.random_range(1..90)
            ));
        }
    }
    let input = write_text(&dir, "ring.gr", &text);
    let loaded = load_graph::<u32, _>(&input, GraphFormat::Dimacs, 1).unwrap();
    let [_, _, tnraf_path] = write_all(&dir, &loaded);
    let manager = manager_for(&tnraf_path, None);

    std::thread::scope(|scope| {
        for worker in 0..4u64 {
            let manager = &manager;
            let graph = &loaded.graph;
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker);
                for _ in 0..300 {
                    let s = rng.random_range(0..n);
                    let t = rng.random_range(0..n);
                    let expected = shortest_distance(graph, s, t);
                    assert_eq!(manager.distance_query(s, t).unwrap(), Distance::Integer(expected));
                }
            });
        }
    });
}

#[test]
fn csv_tables_to_dm_structure_and_matrix() {
    let dir = TempDir::new().unwrap();
    let tables = dir.path().join("city");
    std::fs::create_dir(&tables).unwrap();
    std::fs::write(tables.join("nodes.csv"), "id\tx\ty\n0\t0\t0\n1\t1\t0\n2\t1\t1\n3\t0\t1\n").unwrap();
    std::fs::write(
        tables.join("edges.csv"),
        "u\tv\tcost\n0\t1\t40\n1\t2\t30\n2\t3\t20\n3\t0\t10\n0\t2\t90\n",
    )
    .unwrap();
    assert_eq!(GraphFormat::detect(&tables), Some(GraphFormat::Csv));
    let loaded = load_graph::<u32, _>(&tables, GraphFormat::Csv, 10).unwrap();
    assert_eq!(loaded.graph.n_nodes(), 4);

    let (ch, _) = build_ch(&loaded.graph, &ChConfig::default(), Provenance::default()).unwrap();
    let config = TnrConfig {
        transit_count: 2,
        mode: TnrMode::Dm,
    };
    let (tnr, _) = build_tnr(ch, &config).unwrap();
    let tnr_path = dir.path().join("city.bdtn");
    TnrFile::write(&tnr_path, &tnr).unwrap();
    let manager = manager_for(&tnr_path, None);
    // 0 -> 1 -> 2 (4 + 3) beats the direct 9
    assert_eq!(manager.distance_query(0, 2).unwrap(), Distance::Integer(7));
    assert_eq!(manager.distance_query(2, 1).unwrap(), Distance::Integer(7));

    let matrix = DistanceMatrix::compute(&loaded.graph).unwrap();
    let csv_path = dir.path().join("city.csv");
    matrix.write_csv(&csv_path).unwrap();
    let text = std::fs::read_to_string(&csv_path).unwrap();
    let rows: Vec<Vec<u32>> = text
        .lines()
        .map(|line| line.split(',').map(|cell| cell.parse().unwrap()).collect())
        .collect();
    assert_eq!(rows.len(), 4);
    for s in 0..4u32 {
        for t in 0..4u32 {
            let expected = shortest_distance(&loaded.graph, s, t);
            assert_eq!(rows[s as usize][t as usize], expected);
            assert_eq!(manager.distance_query(s, t).unwrap(), Distance::Integer(expected));
        }
    }
}
