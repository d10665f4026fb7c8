pub mod traj;
