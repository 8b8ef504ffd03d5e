use std::{
    io::Write,
    net::{TcpListener, TcpStream},
    thread,
    time::Duration,
};

use atsp_bnb::{
    build_initial_queue, run_process, solve_cluster, Error, SearchConfig, TcpTransport,
};
use atsp_core::CostMatrix;

#[test]
fn every_rank_reports_the_optimum() {
    for n in [5, 6, 8] {
        for seed in [1, 8] {
            let m = CostMatrix::random(n, 60, seed).unwrap();
            let expected = atsp_brute_force::solve(&m).cost();
            for (procs, threads, split) in [(2, 1, 2), (2, 2, 2), (3, 2, 1), (4, 1, 3)] {
                let reports = solve_cluster(&m, &SearchConfig::new(threads, split), procs).unwrap();
                assert_eq!(reports.len(), procs);
                for (rank, report) in reports.iter().enumerate() {
                    assert_eq!(report.rank, rank);
                    assert_eq!(report.processes, procs);
                    assert_eq!(
                        report.cost, expected,
                        "n {n} seed {seed} procs {procs} threads {threads} rank {rank}"
                    );
                    report.tour.validate_closed(&m).unwrap();
                }
            }
        }
    }
}

#[test]
fn initial_queue_is_split_across_processes() {
    let m = CostMatrix::random(7, 40, 12).unwrap();
    let reports = solve_cluster(&m, &SearchConfig::new(2, 2), 3).unwrap();
    let handed_out: u64 = reports.iter().map(|r| r.stats.initial_tours).sum();
    assert_eq!(handed_out, build_initial_queue(&m, 6).unwrap().len() as u64);
    assert!(reports.iter().all(|r| r.stats.initial_tours > 0));
}

#[test]
fn too_many_workers_fails_on_every_rank() {
    let m = CostMatrix::random(3, 10, 4).unwrap();
    let err = solve_cluster(&m, &SearchConfig::new(2, 2), 2).unwrap_err();
    assert!(matches!(err, Error::TooManyWorkers { workers: 4, .. }), "{err}");
}

#[test]
fn zero_processes_is_rejected() {
    let m = CostMatrix::random(4, 10, 4).unwrap();
    assert!(matches!(
        solve_cluster(&m, &SearchConfig::new(1, 2), 0),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn a_failing_process_aborts_the_others() {
    let m = CostMatrix::random(7, 20, 6).unwrap();
    let config = SearchConfig::new(2, 2).with_stack_capacity(2);
    let err = solve_cluster(&m, &config, 3).unwrap_err();
    assert!(
        matches!(err, Error::Core(atsp_core::Error::StackOverflow { .. })),
        "{err}"
    );
}

#[test]
fn tcp_cluster_over_loopback() {
    let m = CostMatrix::random(7, 80, 21).unwrap();
    let expected = atsp_brute_force::solve(&m).cost();
    let config = SearchConfig::new(2, 2);
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let costs: Vec<u64> = thread::scope(|s| {
        let (m, config) = (&m, &config);
        let nodes: Vec<_> = (1..3)
            .map(|rank| {
                s.spawn(move || {
                    let transport =
                        TcpTransport::connect(addr, rank, 3, Duration::from_secs(10)).unwrap();
                    run_process(m, config, &transport).unwrap().cost
                })
            })
            .collect();
        let root = TcpTransport::bind_root(listener, 3).unwrap();
        let mut costs = vec![run_process(m, config, &root).unwrap().cost];
        costs.extend(nodes.into_iter().map(|h| h.join().unwrap()));
        costs
    });
    assert_eq!(costs, vec![expected; 3]);
}

#[test]
fn root_stops_when_a_node_disappears() {
    let m = CostMatrix::random(6, 40, 13).unwrap();
    let config = SearchConfig::new(2, 2);
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let root = TcpTransport::bind_root(listener, 2).unwrap();
        let _ = tx.send(run_process(&m, &config, &root));
    });

    // Joins the cluster, then goes away without ever reporting done.
    let mut node = TcpStream::connect(addr).unwrap();
    node.write_all(b"{\"Hello\":{\"rank\":1,\"size\":2}}\n").unwrap();
    thread::sleep(Duration::from_millis(200));
    drop(node);

    let result = rx
        .recv_timeout(Duration::from_secs(30))
        .expect("root kept waiting for a node that is gone");
    assert!(result.is_err());
}
