/*
 * Copyright (c) 2018-2019, Trustees of Indiana University
 *     ("University Works" via Baojun Wang)
 * Copyright (c) 2018-2019, Ryan Newton
 *     ("Traditional Works of Scholarship")
 *
 *  All rights reserved.
 *
 *  This source code is licensed under the BSD-style license found in the
 *  LICENSE file in the root directory of this source tree.
 */

use std::process;
use std::sync::Arc;

use vdso_skew::cli::Opt;
use vdso_skew::offset::split_seconds_nanos;
use vdso_skew::{calculate_offset, children, encode_clk_ids, get_skew, logging, Config};

#[paw::main]
fn main(opt: Opt) {
    if let Err(e) = logging::init(opt.verbose) {
        eprintln!("failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(opt) {
        log::error!("{}", e);
        process::exit(1);
    }
}

fn run(opt: Opt) -> vdso_skew::Result<()> {
    let offset = calculate_offset(&opt.faketime)?;
    let (delta_seconds, delta_nanoseconds) = split_seconds_nanos(offset);
    let mask = encode_clk_ids(&opt.clk_ids)?;
    let cfg = Config::new(delta_seconds, delta_nanoseconds, mask);
    if log::log_enabled!(log::Level::Debug) {
        match serde_json::to_string(&cfg) {
            Ok(json) => log::debug!("resolved config: {}", json),
            Err(e) => log::debug!("resolved config (unserializable: {}): {:?}", e, cfg),
        }
    }
    let skew = Arc::new(get_skew(&cfg)?);

    if opt.recover {
        skew.recover(opt.pid as u64)?;
        log::info!("recovered pid {}", opt.pid);
        return Ok(());
    }

    skew.inject(opt.pid as u64)?;
    log::info!("injected pid {}", opt.pid);

    if opt.include_children {
        let kids = children::descendants(opt.pid)?;
        log::debug!("found {} descendant(s) of pid {}", kids.len(), opt.pid);
        let handles: Vec<_> = kids
            .into_iter()
            .map(|child| {
                let skew = Arc::clone(&skew);
                std::thread::spawn(move || -> vdso_skew::Result<()> {
                    let forked = skew.fork()?;
                    forked.inject(child as u64)?;
                    log::info!("injected child pid {}", child);
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            if let Err(e) = handle.join().unwrap() {
                log::warn!("failed to inject a child process: {}", e);
            }
        }
    }

    Ok(())
}
